#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Pipeline orchestration
//!
//! Wires the staged components together: single-repo pipeline runs, the
//! multi-repo batch scanner with its manifests and report index, retention
//! pruning of dated artifact directories, and the determinism verifier.

mod clock;
mod pipeline;
mod retention;
mod scan;
mod verify;

pub use clock::{date_token, ts_token, utc_now, FIXED_UTC_NOW_VAR};
pub use pipeline::{
    run_pipeline, PipelineOptions, PipelineOutcome, ENV_OVERRIDES_FILE, NORMALIZED_FILE,
    REPORT_JSON_FILE, REPORT_MD_FILE, THREAT_INTEL_FILE,
};
pub use retention::{prune, RetentionOptions, RetentionReport, RetentionSection};
pub use scan::{scan, RepoOutcome, ScanOptions, ScanSummary};
pub use verify::{verify_determinism, VerifyOptions};
