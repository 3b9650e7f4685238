//! Error types for the client facade.
//!
//! # Design
//! Only misuse and encoding failures are returned as `Err`. Network and
//! HTTP-status failures are recorded on the `Response` instead (see
//! `RequestError` in `response.rs`), so a failed exchange is still a value
//! the caller can inspect.

use thiserror::Error;

/// Errors returned synchronously by `HttpClient` methods.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport backend cannot be used in this build or runtime.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// A request body could not be encoded to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The client was closed and holds no transport handle.
    #[error("client is closed")]
    Closed,
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}
