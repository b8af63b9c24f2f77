//! HTTP-facing error type for the relay surface.
//!
//! Every failure, whether it originates in the core transforms or in this
//! crate's own upstream plumbing, is rendered as an OpenAI-shaped
//! `{error: {message, type, code}}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use transform::TransformError;

pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid JSON body: {0}")]
    InvalidInput(String),

    #[error("missing OPENAI_API_KEY")]
    MissingCredentials,

    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("upstream connection error: {0}")]
    UpstreamConnection(String),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Transform(TransformError::UpstreamStreamNoResponse) => StatusCode::BAD_GATEWAY,
            Self::Transform(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredentials => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamConnection(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamStatus { status, .. } => *status,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_request_error",
            Self::Transform(TransformError::UpstreamStreamNoResponse) => "api_error",
            Self::Transform(_) => "invalid_request_error",
            Self::MissingCredentials => "internal_error",
            Self::UpstreamTimeout(_) => "timeout_error",
            Self::UpstreamConnection(_) => "api_error",
            Self::UpstreamStatus { .. } => "upstream_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::UpstreamStatus { body, .. } => body.clone(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetails { message, r#type: self.error_type().to_string(), code: status.as_u16() },
        };
        (status, Json(body)).into_response()
    }
}
