//! MCP-backed tool host.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::{ToolError, ToolHost};
use mcp::{Connection, ServerConfig};
use serde_json::Value;

/// Tool host backed by one MCP provider connection.
pub struct McpToolHost {
    connection: Connection,
    specs: Vec<ToolSpec>,
}

impl McpToolHost {
    /// Open a connection to the provider and fetch its tool catalog.
    ///
    /// On any failure the provider process is torn down before the error
    /// is returned.
    pub async fn connect(config: ServerConfig) -> Result<Self, mcp::Error> {
        let connection = Connection::open(config).await?;
        let tools = match connection.list_tools().await {
            Ok(tools) => tools,
            Err(err) => {
                connection.close().await;
                return Err(err);
            }
        };

        let specs: Vec<ToolSpec> = tools.into_iter().map(ToolSpec::from).collect();
        tracing::debug!(tools = specs.len(), "tool catalog loaded");
        Ok(Self { connection, specs })
    }

    /// Name the provider reported during the handshake.
    pub fn server_name(&self) -> &str {
        &self.connection.server_info().server_info.name
    }

    /// Close the underlying connection and terminate the provider process.
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

impl From<mcp::Tool> for ToolSpec {
    fn from(tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            schema: tool.input_schema,
        }
    }
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let arguments = match &call.arguments {
            Value::Null => None,
            Value::Object(_) => Some(call.arguments.clone()),
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "arguments must be a JSON object, got {other}"
                )));
            }
        };

        let result = self
            .connection
            .call_tool(&call.name, arguments)
            .await
            .map_err(|e| match e {
                mcp::Error::Timeout(elapsed) => ToolError::Timeout(elapsed.as_millis() as u64),
                other => ToolError::Execution(other.to_string()),
            })?;

        // Most documentation tools answer in text; fall back to the raw
        // content blocks for anything else.
        let text = result.text();
        if text.is_empty() {
            serde_json::to_value(&result.content)
                .map_err(|e| ToolError::Execution(format!("serialize result: {e}")))
        } else {
            Ok(Value::String(text))
        }
    }
}
