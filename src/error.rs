//! Error types shared by the handlers, the gateway and the image pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::gateway::GatewayError;
use crate::imaging::ImageError;

pub type Result<T> = std::result::Result<T, AppError>;

/// Top-level error returned by request handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    /// Extractor rejection that carries its own status (e.g. 413 for oversized bodies)
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("image processing failed: {0}")]
    Decode(#[from] ImageError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Rejected { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// JSON error body
///
/// `status` is only present for failures of the streaming endpoint, where the
/// front-end shares one parser between error bodies and relay events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = match &self {
            Self::Gateway(_) | Self::StreamInterrupted(_) => {
                ErrorBody::new(self.to_string()).with_status("error")
            }
            _ => ErrorBody::new(self.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
