//! Threat-intel fetch error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum IntelError {
    #[error("EPSS fetch failed: {message}")]
    EpssFetchFailed { message: String },

    #[error("KEV catalog fetch failed: {message}")]
    KevFetchFailed { message: String },

    #[error("malformed intel response from {source_name}: {message}")]
    MalformedResponse { source_name: String, message: String },
}

impl UserFacingError for IntelError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some("Threat intel degrades to an empty cache; rerun online to refresh it.")
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EpssFetchFailed { .. } | Self::KevFetchFailed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::EpssFetchFailed { .. } => "intel.epss_fetch_failed",
            Self::KevFetchFailed { .. } => "intel.kev_fetch_failed",
            Self::MalformedResponse { .. } => "intel.malformed_response",
        })
    }
}
