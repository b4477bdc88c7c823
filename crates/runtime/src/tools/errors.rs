use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a single tool invocation.
///
/// These are never fatal to a turn: the loop records them in the trace and
/// feeds them back to the model as the call's result. They serialize with a
/// `kind`/`detail` shape so trace consumers can match on the kind.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ToolError {
    /// The requested tool is not in the catalog this session was bound to.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The arguments did not have the shape the provider accepts.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The provider did not answer within the configured deadline.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// The provider ran the tool and reported a failure.
    #[error("execution failed: {0}")]
    Execution(String),
}
