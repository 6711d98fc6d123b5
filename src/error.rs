//! Error types.
//!
//! Routing misses (404, 405) are responses, not errors. The types here cover
//! the failures that reach code: serving infrastructure, body parsing, and
//! JSON binding.

use thiserror::Error;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Serving-level failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A handler panicked before writing any status. The connection is dropped
    /// without a response.
    #[error("handler panicked on `{endpoint}`")]
    Panicked { endpoint: String },
}

/// Failure while buffering or parsing a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("malformed content type: {0}")]
    ContentType(#[from] mime::FromStrError),

    #[error("multipart body without a boundary")]
    MissingBoundary,

    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("reading request body: {0}")]
    Read(#[source] BoxError),
}

/// Failure of [`Context::bind_json`](crate::Context::bind_json) or
/// [`Context::should_bind_json`](crate::Context::should_bind_json).
#[derive(Debug, Error)]
pub enum BindError {
    #[error("deserializing body: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// The first field-level rule that rejected a bound value.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub rule: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, rule: &'static str, message: impl Into<String>) -> Self {
        Self { field, rule, message: message.into() }
    }
}
