use serde_json::Value;
use thiserror::Error;

/// Errors produced by the Blade protocol layer.
#[derive(Debug, Error)]
pub enum BladeError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The server answered with an error payload.
    #[error("rpc error: {0}")]
    Rpc(Value),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("session closed")]
    SessionClosed,

    /// No correlated reply arrived within the execute timeout.
    #[error("timeout")]
    Timeout,
}

impl From<serde_json::Error> for BladeError {
    fn from(e: serde_json::Error) -> Self {
        BladeError::Codec(e.to_string())
    }
}

pub type BladeResult<T> = Result<T, BladeError>;
