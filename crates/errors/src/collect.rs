//! Raw-finding collector error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CollectError {
    #[error("auth token env var {var} is not set for the {source_name} collector")]
    TokenMissing { source_name: String, var: String },

    #[error("override file does not exist: {path}")]
    OverrideMissing { path: String },

    #[error("{source_name} collection failed after {attempts} attempts: {message}")]
    FetchFailed {
        source_name: String,
        attempts: u32,
        message: String,
    },

    #[error("{source_name} API failed and no fallback file is configured")]
    FallbackMissing { source_name: String },

    #[error("{var} is invalid: {message}")]
    InvalidEnv { var: String, message: String },
}

impl UserFacingError for CollectError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::TokenMissing { .. } => {
                Some("Export the token env var, or point TRIAGE_DEPENDENCY_FEED_FILE at a payload file.")
            }
            Self::OverrideMissing { .. } => {
                Some("Fix the env-override path or unset the variable to use the API.")
            }
            Self::FetchFailed { .. } => {
                Some("Check connectivity and credentials, or provide a local payload file.")
            }
            Self::FallbackMissing { .. } => {
                Some("Configure sources.image_scan.fallback_file for degraded operation.")
            }
            Self::InvalidEnv { .. } => {
                Some("Set the variable to an integer within its documented bounds, or unset it.")
            }
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::TokenMissing { .. } => "collect.token_missing",
            Self::OverrideMissing { .. } => "collect.override_missing",
            Self::FetchFailed { .. } => "collect.fetch_failed",
            Self::FallbackMissing { .. } => "collect.fallback_missing",
            Self::InvalidEnv { .. } => "collect.invalid_env",
        })
    }
}
