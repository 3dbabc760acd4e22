//! Error types for the request builder and body encoders.
//!
//! # Design
//! Argument and protocol errors are raised synchronously at the point of
//! violation. Transport and response-stream errors arrive asynchronously and
//! settle the builder. Every variant carries a stable machine-readable code
//! (see [`Error::code`]) next to its human-readable message.
//!
//! `Error` is `Clone` because a single transport failure is delivered to
//! several consumers at once: event subscribers, chunk streams and the
//! pending `perform()` call. Foreign error sources are held behind `Arc`.

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use crate::http::Method;

/// Errors returned by `RequestBuilder`, the factory and the body encoders.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The verb is not one of PUT, POST, PATCH, DELETE, GET, HEAD, OPTIONS.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// The URL scheme is neither `http` nor `https`.
    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),

    /// A body write was attempted on a method that forbids a body.
    #[error("write on read-only method {0}")]
    WriteOnReadOnlyMethod(Method),

    /// Malformed input to a mutator or encoder.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The URL string could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Query parameters were changed after the path was finalized.
    #[error("query parameters cannot change once the request has started")]
    QueryFrozen,

    /// The builder has already settled or been disposed.
    #[error("request already settled")]
    Settled,

    /// The transport went away before the exchange completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Pass-through failure from the transport capability.
    #[error("transport error: {0}")]
    Transport(Arc<dyn StdError + Send + Sync>),

    /// I/O failure while streaming the response body.
    #[error("io error: {0}")]
    Io(Arc<io::Error>),
}

impl Error {
    pub(crate) fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Wrap any transport-level failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Transport(Arc::new(err))
    }

    /// Stable code that callers can match on without parsing messages.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidMethod(_) => "invalid_method",
            Error::InvalidProtocol(_) => "invalid_protocol",
            Error::WriteOnReadOnlyMethod(_) => "write_on_read_method",
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::InvalidUrl(_) => "invalid_url",
            Error::QueryFrozen => "query_frozen",
            Error::Settled => "settled",
            Error::ConnectionClosed => "connection_closed",
            Error::Transport(_) => "transport",
            Error::Io(_) => "io",
        }
    }

    /// Whether this error came from the transport or the response stream
    /// rather than from caller input.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Io(_) | Error::ConnectionClosed
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}
