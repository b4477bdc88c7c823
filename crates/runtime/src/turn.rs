//! One conversation turn: the model/tool loop.
//!
//! A turn starts from a user query and alternates between model calls and
//! tool executions until the model answers without requesting tools, the
//! call budget runs out, or the model call fails. Tool failures are not
//! fatal: they are recorded and fed back so the model can recover.

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, ToolCall, ToolResult, ToolSpec,
    Usage,
};
use crate::tools::{ToolError, ToolHost};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Model calls allowed per turn before the turn is failed.
pub const DEFAULT_MAX_MODEL_CALLS: usize = 10;

/// How long to wait before the single rate-limit retry.
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Per-turn limits.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    pub max_model_calls: usize,
    pub rate_limit_cooldown: Duration,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            max_model_calls: DEFAULT_MAX_MODEL_CALLS,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
        }
    }
}

/// Cumulative token usage across the model calls of one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    fn record(&mut self, usage: Usage) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens = self.prompt_tokens + self.completion_tokens;
    }
}

/// How one tool invocation ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: Value },
    Failed { error: ToolError },
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One entry in a turn's tool trace, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: Value,
    pub result: ToolOutcome,
    /// Position in the turn's trace, starting at 0.
    pub sequence_index: usize,
    pub duration_ms: u64,
}

/// Why a turn failed.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The provider was still rate limiting after the single retry.
    #[error("rate limit persisted after retry: {0}")]
    RateLimited(String),

    /// The model call failed for a non-retryable reason.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model kept requesting tools past the call budget.
    #[error("gave up after {limit} model calls without a final answer")]
    LoopLimit { limit: usize },
}

/// The outcome of one conversation turn.
///
/// A failed turn still carries whatever tool trace and token usage
/// accumulated before the failure.
#[derive(Debug)]
pub struct TurnResult {
    pub answer_text: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub usage: TokenUsage,
    pub error: Option<TurnError>,
}

impl TurnResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

pub(crate) async fn run_turn<B: Backend, H: ToolHost>(
    backend: &B,
    host: &H,
    instruction: &str,
    options: &TurnOptions,
    query: &str,
) -> TurnResult {
    let catalog = host.specs();
    let mut messages = vec![Message::user(query)];
    let mut trace: Vec<ToolCallRecord> = Vec::new();
    let mut usage = TokenUsage::default();
    let mut model_calls = 0usize;

    loop {
        if model_calls >= options.max_model_calls {
            tracing::warn!(limit = options.max_model_calls, "model call budget exhausted");
            return TurnResult {
                answer_text: String::new(),
                tool_calls: trace,
                usage,
                error: Some(TurnError::LoopLimit {
                    limit: options.max_model_calls,
                }),
            };
        }
        model_calls += 1;
        tracing::debug!(iteration = model_calls, messages = messages.len(), "model call");

        let response = match call_model(
            backend,
            instruction,
            &messages,
            catalog,
            options.rate_limit_cooldown,
        )
        .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(error = %error, "turn failed");
                return TurnResult {
                    answer_text: String::new(),
                    tool_calls: trace,
                    usage,
                    error: Some(error),
                };
            }
        };
        usage.record(response.usage);

        let answer = response.message.text();
        let requests = response.message.tool_calls();
        messages.push(response.message);

        if requests.is_empty() {
            tracing::debug!(model_calls, tool_calls = trace.len(), "turn complete");
            return TurnResult {
                answer_text: answer,
                tool_calls: trace,
                usage,
                error: None,
            };
        }

        let mut results = Vec::with_capacity(requests.len());
        for call in &requests {
            let started = Instant::now();
            let executed = execute_call(host, catalog, call).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let (result, outcome) = match executed {
                Ok(output) => {
                    tracing::debug!(tool = %call.name, duration_ms, "tool call succeeded");
                    (
                        ToolResult::Success {
                            tool_call_id: call.id.clone(),
                            output: output.clone(),
                        },
                        ToolOutcome::Success { output },
                    )
                }
                Err(error) => {
                    tracing::warn!(tool = %call.name, duration_ms, error = %error, "tool call failed");
                    (
                        ToolResult::Failure {
                            tool_call_id: call.id.clone(),
                            error: error.clone(),
                        },
                        ToolOutcome::Failed { error },
                    )
                }
            };

            trace.push(ToolCallRecord {
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: outcome,
                sequence_index: trace.len(),
                duration_ms,
            });
            results.push(result);
        }

        messages.push(Message::tool_results(results));
    }
}

/// One model call, with a single bounded wait-and-retry when the provider
/// reports a rate limit.
async fn call_model<B: Backend>(
    backend: &B,
    instruction: &str,
    messages: &[Message],
    tools: &[ToolSpec],
    cooldown: Duration,
) -> Result<ModelResponse, TurnError> {
    let request = ModelRequest {
        system: Some(instruction),
        messages,
        tools,
    };
    let error = match backend.call(request).await {
        Ok(response) => return Ok(response),
        Err(error) if error.is_rate_limit() => error,
        Err(error) => return Err(TurnError::Model(error)),
    };

    tracing::warn!(cooldown = ?cooldown, error = %error, "rate limited, retrying once");
    tokio::time::sleep(cooldown).await;

    let retry = ModelRequest {
        system: Some(instruction),
        messages,
        tools,
    };
    backend.call(retry).await.map_err(|error| match error {
        ModelError::RateLimited(message) => TurnError::RateLimited(message),
        other => TurnError::Model(other),
    })
}

/// Execute one requested call, validating the name against the bound
/// catalog first so hallucinated tools never reach the provider.
async fn execute_call<H: ToolHost>(
    host: &H,
    catalog: &[ToolSpec],
    call: &ToolCall,
) -> Result<Value, ToolError> {
    if !catalog.iter().any(|spec| spec.name == call.name) {
        return Err(ToolError::NotFound(call.name.clone()));
    }
    host.execute(call).await
}
