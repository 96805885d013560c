//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("request failed: {message}")]
    RequestFailed { message: String },

    #[error("HTTP error {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::RequestFailed { .. } => {
                Some("Check network connectivity and retry, or rerun with --offline.")
            }
            Self::RateLimited { .. } => Some("Wait for the rate-limit window to pass and retry."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::RequestFailed { .. }
                | Self::RateLimited { .. }
                | Self::HttpStatus { status: 500..=599, .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::Timeout { .. } => "network.timeout",
            Self::RequestFailed { .. } => "network.request_failed",
            Self::HttpStatus { .. } => "network.http_status",
            Self::InvalidUrl { .. } => "network.invalid_url",
            Self::RateLimited { .. } => "network.rate_limited",
        })
    }
}
