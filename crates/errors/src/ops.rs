//! Operation orchestration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum OpsError {
    #[error("required input not found: {path}")]
    InputNotFound { path: String },

    #[error("pipeline stage {stage} failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("deterministic_mode must be true for batch scans (repo {repo})")]
    DeterministicModeRequired { repo: String },

    #[error("non-deterministic output detected: {file}")]
    DeterminismMismatch { file: String },

    #[error("{failed} of {total} repository runs failed")]
    BatchFailed { failed: usize, total: usize },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl UserFacingError for OpsError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InputNotFound { .. } => Some("Check the input paths passed on the command line."),
            Self::DeterministicModeRequired { .. } => {
                Some("Set processing.deterministic_mode to true in .triage/config.json.")
            }
            Self::DeterminismMismatch { .. } => {
                Some("A pipeline stage produced unstable output; please report this.")
            }
            Self::BatchFailed { .. } => Some("Inspect the run manifests for per-repo failures."),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::InputNotFound { .. } => "ops.input_not_found",
            Self::StageFailed { .. } => "ops.stage_failed",
            Self::DeterministicModeRequired { .. } => "ops.deterministic_mode_required",
            Self::DeterminismMismatch { .. } => "ops.determinism_mismatch",
            Self::BatchFailed { .. } => "ops.batch_failed",
            Self::InvalidArgument { .. } => "ops.invalid_argument",
        })
    }
}
