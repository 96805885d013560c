#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the triage pipeline
//!
//! This crate provides the data model shared across the pipeline stages:
//! finding records, threat signals, environmental metrics, scored report
//! rows, and the immutable rank/weight tables used by the scorer.

pub mod env;
pub mod finding;
pub mod intel;
pub mod report;
pub mod tables;

// Re-export commonly used types
pub use env::{EnvOverridesDoc, EnvTokens};
pub use finding::{
    CorrelatedFinding, InputFinding, NormalizedDoc, NormalizedItem, Severity, Source, SourceBucket,
};
pub use intel::{ExploitationLevel, FetchStatus, IntelSources, ThreatIntelDoc, ThreatSignal};
pub use report::{ReportDoc, ReportSummary, RuntimePresence, ScoredFinding};
pub use tables::{ScoreTables, Weights};

/// Sentinel used wherever a value is absent but downstream code expects a string.
pub const UNKNOWN: &str = "unknown";

/// State of an input document, as disclosed in report output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputState {
    Present,
    Missing,
}

impl InputState {
    #[must_use]
    pub fn from_present(present: bool) -> Self {
        if present {
            Self::Present
        } else {
            Self::Missing
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Missing => "missing",
        }
    }
}

impl std::fmt::Display for InputState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
