use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::records::RecordError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("Unknown user or fridge")]
    UnknownReference,
    #[error("Record not found")]
    NotFound,
    #[error("You have already submitted a record on this date.")]
    DuplicateDay { recorded_at: DateTime<Utc> },
    /// `context` is the only text the caller sees; `cause` is logged.
    #[error("{context}")]
    Internal {
        context: &'static str,
        cause: anyhow::Error,
    },
}

impl AppError {
    pub fn internal(context: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            context,
            cause: cause.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::UnknownReference => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateDay { .. } => StatusCode::CONFLICT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::DuplicateDay { recorded_at } => {
                json!({ "error": self.to_string(), "recordedAt": recorded_at })
            }
            AppError::Internal { context, cause } => {
                error!(error = ?cause, "{context}");
                json!({ "error": context })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Maps service failures onto HTTP errors, using `context` as the public
/// message for anything unexpected.
pub trait RecordResultExt<T> {
    fn or_internal(self, context: &'static str) -> Result<T, AppError>;
}

impl<T> RecordResultExt<T> for Result<T, RecordError> {
    fn or_internal(self, context: &'static str) -> Result<T, AppError> {
        self.map_err(|e| match e {
            RecordError::DuplicateDay { recorded_at } => AppError::DuplicateDay { recorded_at },
            RecordError::NotFound(_) => AppError::NotFound,
            RecordError::UnknownReference => AppError::UnknownReference,
            RecordError::Database(e) => AppError::internal(context, e),
        })
    }
}
