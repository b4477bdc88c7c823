//! Client for MCP (Model Context Protocol) tool providers.
//!
//! A [`Connection`] launches a provider as a child process and speaks
//! JSON-RPC 2.0 with it over stdio, one JSON object per line.
//! [`Connection::open`] completes the MCP initialize handshake before
//! returning, so an open connection is always ready for
//! [`Connection::list_tools`] and [`Connection::call_tool`].
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Connection, ServerConfig};
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::new("docs", "uvx")
//!     .arg("awslabs.aws-documentation-mcp-server@latest");
//!
//! let connection = Connection::open(config).await?;
//! for tool in connection.list_tools().await? {
//!     println!("{}", tool.name);
//! }
//!
//! let result = connection
//!     .call_tool(
//!         "search_documentation",
//!         Some(serde_json::json!({"search_phrase": "S3 bucket naming"})),
//!     )
//!     .await?;
//! println!("{}", result.text());
//!
//! connection.close().await;
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
mod protocol;

pub use connection::{Connection, DEFAULT_TIMEOUT, MAX_RESPONSE_SIZE, ServerConfig};
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId, ResourceContents,
    ServerCapabilities, ServerInfo, Tool, ToolContent, ToolsCapability,
};
