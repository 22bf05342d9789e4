use std::io;

use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Protocol-level failures of the remote bridge. Each one is fatal for
/// the request it occurred in, never for the connection: the bridge still
/// acknowledges the request with an exception-flagged response.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("malformed value: {0}")]
    MalformedValue(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
