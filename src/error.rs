use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Message recording requires the dispatch bus to be installed")]
    FeatureUnavailable,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Header values must not contain line breaks")]
    BadHeader,

    #[error("No recipients have been added")]
    NoRecipients,

    #[error("The message does not specify a sender and a default sender has not been configured")]
    MissingSender,

    #[error("Failed to build message: {0}")]
    Build(String),
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MailError::Transport(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::Build(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MailError>;

/// Error surface of the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Mail delivery failed: {0}")]
    Delivery(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Delivery(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::Transport(msg) => AppError::Delivery(msg),
            MailError::Config(_) | MailError::FeatureUnavailable => {
                AppError::InternalError(err.to_string())
            }
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, AppError>;
