use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::shortcode::ShortcodeError;
use crate::storage::StorageError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub details: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Shortcode(#[from] ShortcodeError),
    #[error("{message}: {details}")]
    BadRequest { message: String, details: String },
    #[error("{message}: {details}")]
    Internal { message: String, details: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn internal(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::Expired(_)) => StatusCode::GONE,
            ApiError::Storage(StorageError::AlreadyExists(_)) => StatusCode::CONFLICT,
            ApiError::Shortcode(ShortcodeError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Shortcode(ShortcodeError::InternalFailure(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message_and_details(&self) -> (String, String) {
        match self {
            ApiError::Storage(StorageError::NotFound(_)) => {
                ("Shortcode not found".to_string(), String::new())
            }
            ApiError::Storage(StorageError::Expired(_)) => {
                ("Shortcode has expired".to_string(), String::new())
            }
            ApiError::Storage(StorageError::AlreadyExists(_)) => {
                ("Shortcode already exists".to_string(), String::new())
            }
            ApiError::Shortcode(ShortcodeError::InvalidInput(details)) => {
                ("Invalid shortcode format".to_string(), details.clone())
            }
            ApiError::Shortcode(ShortcodeError::InternalFailure(details)) => {
                ("Failed to generate shortcode".to_string(), details.clone())
            }
            ApiError::BadRequest { message, details } | ApiError::Internal { message, details } => {
                (message.clone(), details.clone())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = self.message_and_details();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "API error");
        } else {
            warn!(status = status.as_u16(), error = %self, "API error");
        }

        let body = ErrorResponse {
            error: message,
            code: status.as_u16(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
