use thiserror::Error;

/// Errors produced by the protocol transforms.
///
/// Variants correspond to the error taxonomy in the system design: each one
/// maps to a single HTTP status at the server boundary, but this crate never
/// constructs an HTTP response itself.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The request body was not a JSON object, or a required field had the
    /// wrong shape (e.g. `messages` present but not a list).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A Responses stream ended without any terminal event
    /// (`response.completed|incomplete|failed`) carrying a `response` object.
    #[error("upstream stream ended without a response object")]
    UpstreamStreamNoResponse,
}

pub type Result<T> = std::result::Result<T, TransformError>;
