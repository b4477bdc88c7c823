//! Connection error types.

use crate::protocol::JsonRpcError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The provider process could not be launched.
    #[error("failed to launch provider: {0}")]
    Spawn(std::io::Error),

    /// Reading or writing the provider's stdio pipes failed.
    #[error("provider transport error: {0}")]
    Transport(std::io::Error),

    #[error("provider exited unexpectedly")]
    ServerExited,

    #[error("no response from provider after {0:?}")]
    Timeout(Duration),

    #[error("connection is closed")]
    Closed,

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The provider answered `tools/list` with something that does not
    /// decode as a tool catalog.
    #[error("malformed tool catalog: {0}")]
    MalformedCatalog(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("response too large: {size} bytes (max {max})")]
    ResponseTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
