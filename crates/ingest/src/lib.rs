#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Raw finding extraction and correlation
//!
//! This crate turns the two schema-flexible feed payloads into the
//! deterministically-ordered set of canonical findings. Extraction reads
//! fields through ordered key-path tables (first structurally-valid match
//! wins); records that yield no CVE are skipped, never fatal. Correlation
//! groups by (cve, package) and merges per the documented rules.

mod correlate;
mod cve;
mod extract;

pub use correlate::{correlate, normalized_doc};
pub use cve::{collect_cve_tokens, normalize_cve};
pub use extract::{extract_dependency_feed, extract_image_scan};
