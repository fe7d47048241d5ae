use thiserror::Error;

/// Message shown for transport-class failures.
pub const RETRY_LATER_MESSAGE: &str = "connection error, please try again later";

/// Errors that abort a streaming turn.
///
/// Transport-class variants cover everything between opening the request and
/// reading the last chunk. `Server` is an explicit `error` event sent by the
/// backend. Cancellation is deliberately absent: it is not an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("response body error: {0}")]
    Body(String),

    #[error("no data received for {0}s")]
    IdleTimeout(u64),

    #[error("{0}")]
    Server(String),
}

impl StreamError {
    /// Whether this failure came from the transport rather than the server.
    pub fn is_transport(&self) -> bool {
        !matches!(self, StreamError::Server(_))
    }

    /// Text surfaced to the user: generic for transport failures, verbatim
    /// for server-reported ones.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Server(message) => message.clone(),
            _ => RETRY_LATER_MESSAGE.to_string(),
        }
    }
}

/// Errors from message store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
