//! Configuration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("unsupported schema_version {found}; supported: {supported}")]
    UnsupportedSchemaVersion { found: String, supported: String },

    #[error("repository layout violation: {path} missing")]
    LayoutViolation { path: String },

    #[error("schema violation at {location}: {message}")]
    SchemaViolation { location: String, message: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } | Self::LayoutViolation { .. } => {
                Some("Create the .triage/ layout with config.json and context.json first.")
            }
            Self::UnsupportedSchemaVersion { .. } => {
                Some("Migrate the config file to the supported schema_version.")
            }
            Self::MissingField { .. } | Self::InvalidValue { .. } | Self::ParseError { .. } => {
                Some("Fix the configuration value and retry the command.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::NotFound { .. } => "config.not_found",
            Self::ParseError { .. } => "config.parse_error",
            Self::MissingField { .. } => "config.missing_field",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::UnsupportedSchemaVersion { .. } => "config.unsupported_schema_version",
            Self::LayoutViolation { .. } => "config.layout_violation",
            Self::SchemaViolation { .. } => "config.schema_violation",
        })
    }
}
