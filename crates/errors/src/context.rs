//! Deployment-context error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ContextError {
    #[error("context file already exists: {path}")]
    AlreadyExists { path: String },

    #[error("answers file is not a JSON object: {path}")]
    InvalidAnswers { path: String },

    #[error("answer path {path} does not resolve to a settable field")]
    AnswerPathInvalid { path: String },
}

impl UserFacingError for ContextError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::AlreadyExists { .. } => Some("Pass --force to overwrite the existing context."),
            Self::InvalidAnswers { .. } | Self::AnswerPathInvalid { .. } => {
                Some("Answers must be a flat JSON object keyed by dotted field paths.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::AlreadyExists { .. } => "context.already_exists",
            Self::InvalidAnswers { .. } => "context.invalid_answers",
            Self::AnswerPathInvalid { .. } => "context.answer_path_invalid",
        })
    }
}
