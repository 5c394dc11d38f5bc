//! Error types for the PrintNode client.
//!
//! # Design
//! Every dispatch operation returns `ApiError` on failure and nothing is
//! retried internally. `HttpFailure` keeps the whole `RawResponse` so callers
//! can read the body the service sent alongside a non-200 status. Transport
//! problems (connect, DNS, timeout) stay separate from protocol problems
//! (`MalformedResponse`) so callers can tell "never reached the service"
//! from "the service answered with garbage".

use thiserror::Error;

use crate::response::RawResponse;

/// Errors returned by `PrintNodeClient` operations and the pieces it is
/// built from.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection refused, DNS failure, timeout, or any other I/O failure
    /// before a complete response was read.
    #[error("transport failure: {0}")]
    TransportError(String),

    /// The response bytes do not frame as an HTTP/1.x message.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The service answered with a status other than 200.
    #[error("HTTP {} {}", .0.status, .0.message)]
    HttpFailure(Box<RawResponse>),

    /// No endpoint or decoder is registered for an entity type.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Bad caller input: wrong arity, non-numeric paging value, non-scalar id.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A dynamic operation name does not resolve in the operation table.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The operation needs client state that is not currently set.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The response body could not be decoded as JSON.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),
}

impl ApiError {
    /// Status code carried by an `HttpFailure`, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpFailure(response) => Some(response.status),
            _ => None,
        }
    }

    /// The full response carried by an `HttpFailure`, if this is one.
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            ApiError::HttpFailure(response) => Some(response),
            _ => None,
        }
    }
}
