//! Agent runtime: conversation sessions over Azure OpenAI with
//! MCP-provided tools.
//!
//! The runtime wires three pieces together:
//!
//! - **[`Session`]**: binds a model backend, a tool host, and a system
//!   instruction; each [`Session::run`] call is one self-contained turn.
//! - **[`Backend`]**: the model provider abstraction, implemented for
//!   Azure OpenAI chat completions by [`AzureOpenAiBackend`].
//! - **[`ToolHost`]**: the tool execution boundary, implemented for MCP
//!   providers by [`McpToolHost`].
//!
//! # Example
//!
//! ```no_run
//! use runtime::{Credentials, McpSettings, McpToolHost, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::from_env()?;
//! let host = McpToolHost::connect(McpSettings::from_env().server_config()).await?;
//!
//! let session = Session::create(&credentials, host, "You are a documentation assistant.");
//! let result = session.run("What is Amazon S3?").await;
//! println!("{}", result.answer_text);
//!
//! session.into_host().close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod model;
pub mod providers;
pub mod session;
pub mod tools;
pub mod turn;

pub use config::{ConfigError, Credentials, McpSettings};
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult,
    ToolSpec, Usage,
};
pub use providers::AzureOpenAiBackend;
pub use session::{Session, SessionSettings};
pub use tools::{EmptyToolHost, McpToolHost, ToolError, ToolHost};
pub use turn::{
    DEFAULT_MAX_MODEL_CALLS, DEFAULT_RATE_LIMIT_COOLDOWN, TokenUsage, ToolCallRecord, ToolOutcome,
    TurnError, TurnOptions, TurnResult,
};
