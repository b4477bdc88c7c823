//! Tool provider lifecycle (spawn, handshake, calls, teardown).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, Tool,
};

/// Default timeout for a single request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum size of a single response line (1MB).
/// Sized for large tool outputs (documentation pages, search results).
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Configuration for launching a tool provider process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The provider's stdio pipes. Locked as a unit so a request and its
/// response form one uninterrupted exchange.
struct Transport {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Transport {
    async fn send(&mut self, payload: &str) -> Result<()> {
        self.stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(Error::Transport)?;
        self.stdin.write_all(b"\n").await.map_err(Error::Transport)?;
        self.stdin.flush().await.map_err(Error::Transport)?;
        Ok(())
    }

    /// Read lines until the response for `expected` arrives.
    ///
    /// Server-initiated notifications carry no `id` and are skipped. So are
    /// replies to earlier requests whose caller gave up mid-exchange (a
    /// timed-out or cancelled call leaves its response in the pipe); those
    /// carry a numeric id below the one awaited here.
    async fn read_response(&mut self, expected: &RequestId) -> Result<JsonRpcResponse> {
        loop {
            let mut line = String::new();
            let bytes_read = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(Error::Transport)?;
            if bytes_read == 0 {
                return Err(Error::ServerExited);
            }
            if line.len() > MAX_RESPONSE_SIZE {
                return Err(Error::ResponseTooLarge {
                    size: line.len(),
                    max: MAX_RESPONSE_SIZE,
                });
            }
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line)
                .map_err(|e| Error::InvalidResponse(e.to_string()))?;
            if value.get("id").is_none() {
                tracing::debug!(method = ?value.get("method"), "skipping notification");
                continue;
            }

            let response: JsonRpcResponse =
                serde_json::from_value(value).map_err(|e| Error::InvalidResponse(e.to_string()))?;
            if response.id == *expected {
                return Ok(response);
            }
            match (&response.id, expected) {
                (RequestId::Number(got), RequestId::Number(want)) if got < want => {
                    tracing::debug!(got = *got, want = *want, "skipping stale response");
                }
                _ => {
                    return Err(Error::InvalidResponse(format!(
                        "response id mismatch: expected {expected:?}, got {:?}",
                        response.id
                    )));
                }
            }
        }
    }
}

/// One request/response exchange, bounded by the configured timeout.
async fn exchange(
    transport: &mut Transport,
    deadline: Duration,
    next_id: &AtomicI64,
    method: &str,
    params: Option<Value>,
) -> Result<Value> {
    let id = RequestId::Number(next_id.fetch_add(1, Ordering::SeqCst));
    let mut request = JsonRpcRequest::new(id.clone(), method);
    if let Some(params) = params {
        request = request.with_params(params);
    }
    let payload = serde_json::to_string(&request)?;

    let round_trip = async {
        transport.send(&payload).await?;
        transport.read_response(&id).await
    };
    let response = timeout(deadline, round_trip)
        .await
        .map_err(|_| Error::Timeout(deadline))??;

    Ok(response.into_result()?)
}

async fn handshake(
    transport: &mut Transport,
    config: &ServerConfig,
    next_id: &AtomicI64,
) -> Result<InitializeResult> {
    let params = serde_json::to_value(InitializeParams::default())?;
    let result = exchange(transport, config.timeout, next_id, "initialize", Some(params)).await?;
    let info: InitializeResult =
        serde_json::from_value(result).map_err(|e| Error::InvalidResponse(e.to_string()))?;

    let initialized = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized",
    });
    transport.send(&serde_json::to_string(&initialized)?).await?;

    Ok(info)
}

/// An open session with a tool provider subprocess.
///
/// The connection performs one exchange at a time: the transport is held
/// for the whole request/response round trip, so concurrent callers queue
/// rather than interleave frames on the pipes.
pub struct Connection {
    config: ServerConfig,
    child: Mutex<Child>,
    transport: Mutex<Option<Transport>>,
    next_id: AtomicI64,
    server_info: InitializeResult,
}

impl Connection {
    /// Launch the provider process and complete the initialize handshake.
    ///
    /// If the handshake fails the process is killed before the error is
    /// returned, so there is nothing for the caller to clean up.
    pub async fn open(config: ServerConfig) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(Error::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        let mut transport = Transport {
            stdin,
            stdout: BufReader::new(stdout),
        };
        let next_id = AtomicI64::new(1);

        match handshake(&mut transport, &config, &next_id).await {
            Ok(server_info) => {
                tracing::debug!(
                    provider = %config.name,
                    server = %server_info.server_info.name,
                    "connection open"
                );
                Ok(Self {
                    config,
                    child: Mutex::new(child),
                    transport: Mutex::new(Some(transport)),
                    next_id,
                    server_info,
                })
            }
            Err(err) => {
                let _ = child.kill().await;
                Err(err)
            }
        }
    }

    /// Name from the launch configuration.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Identity the provider reported during the initialize handshake.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    /// Query the provider's tool catalog.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result = self.request("tools/list", None).await?;
        let catalog: ListToolsResult =
            serde_json::from_value(result).map_err(|e| Error::MalformedCatalog(e.to_string()))?;
        Ok(catalog.tools)
    }

    /// Invoke a named tool and wait for its result.
    ///
    /// A result the provider flags `isError` is surfaced as
    /// [`Error::ToolCallFailed`] carrying the provider's message text.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.request("tools/call", Some(params)).await?;
        let result: CallToolResult =
            serde_json::from_value(result).map_err(|e| Error::InvalidResponse(e.to_string()))?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }
        Ok(result)
    }

    /// Close the connection and terminate the provider process.
    ///
    /// Closing twice is a no-op. Requests issued after close fail with
    /// [`Error::Closed`].
    pub async fn close(&self) {
        let transport = self.transport.lock().await.take();
        if transport.is_none() {
            return;
        }
        // Dropping the transport closes the provider's stdin; kill covers
        // providers that do not exit on EOF.
        drop(transport);
        let mut child = self.child.lock().await;
        let _ = child.kill().await;
        tracing::debug!(provider = %self.config.name, "connection closed");
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(Error::Closed)?;
        exchange(transport, self.config.timeout, &self.next_id, method, params).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.config.name)
            .field("server", &self.server_info.server_info.name)
            .finish_non_exhaustive()
    }
}
