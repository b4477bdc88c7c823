//! Azure OpenAI chat-completions backend.

use crate::config::Credentials;
use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult,
    ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error code Azure uses when a deployment's quota is exhausted.
const RATE_LIMIT_MARKER: &str = "RateLimitReached";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest {
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_call_type")]
    call_type: String,
    function: ApiFunctionCall,
}

fn function_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON-encoded arguments, per the chat-completions wire format.
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Azure OpenAI chat-completions backend.
///
/// Targets a single deployment; the deployment name and API version travel
/// in the URL, authentication in the `api-key` header.
pub struct AzureOpenAiBackend {
    client: reqwest::Client,
    url: String,
    api_key: String,
    api_version: String,
    deployment: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl AzureOpenAiBackend {
    pub fn new(credentials: &Credentials) -> Self {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            credentials.endpoint.trim_end_matches('/'),
            credentials.deployment
        );
        Self {
            client: reqwest::Client::new(),
            url,
            api_key: credentials.api_key.clone(),
            api_version: credentials.api_version.clone(),
            deployment: credentials.deployment.clone(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// One runtime message can expand to several wire messages: tool
    /// results travel as separate `role: "tool"` messages on this API.
    fn message_to_api(msg: &Message, out: &mut Vec<ApiMessage>) {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for part in &msg.parts {
            match part {
                Part::Text(t) => text.push_str(t),
                Part::ToolCall(call) => tool_calls.push(ApiToolCall {
                    id: call.id.clone(),
                    call_type: "function".to_string(),
                    function: ApiFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                }),
                Part::ToolResult(result) => {
                    let (tool_call_id, content) = match result {
                        ToolResult::Success {
                            tool_call_id,
                            output,
                        } => (tool_call_id.clone(), value_to_content(output)),
                        ToolResult::Failure {
                            tool_call_id,
                            error,
                        } => (tool_call_id.clone(), format!("Error: {error}")),
                    };
                    out.push(ApiMessage {
                        role: "tool",
                        content: Some(content),
                        tool_calls: None,
                        tool_call_id: Some(tool_call_id),
                    });
                }
            }
        }

        if !text.is_empty() || !tool_calls.is_empty() {
            out.push(ApiMessage {
                role: Self::role_to_api(msg.role),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            });
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool {
        ApiTool {
            tool_type: "function",
            function: ApiFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.schema.clone(),
            },
        }
    }

    fn response_to_message(api: ApiResponseMessage) -> Message {
        let mut parts = Vec::new();
        if let Some(content) = api.content {
            if !content.is_empty() {
                parts.push(Part::Text(content));
            }
        }
        for call in api.tool_calls.unwrap_or_default() {
            // Arguments arrive JSON-encoded; anything unparseable is kept
            // as a raw string so the tool host can reject it with context.
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            let id = if call.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                call.id
            };
            parts.push(Part::ToolCall(ToolCall {
                id,
                name: call.function.name,
                arguments,
            }));
        }
        Message {
            role: Role::Assistant,
            parts,
        }
    }

    /// Classify a non-2xx response. Azure signals quota exhaustion with
    /// HTTP 429 or with a `RateLimitReached` error code in the body.
    fn error_from_response(status: u16, body: &str) -> ModelError {
        let detail = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.error)
            .ok();
        let message = detail
            .as_ref()
            .map(|d| d.message.clone())
            .unwrap_or_else(|| body.to_string());

        let code = detail.and_then(|d| d.code);
        let rate_limited = status == 429
            || code.as_deref() == Some(RATE_LIMIT_MARKER)
            || body.contains(RATE_LIMIT_MARKER);

        if rate_limited {
            ModelError::RateLimited(message)
        } else {
            ModelError::Api(format!("{status}: {message}"))
        }
    }
}

/// Tool output as the content of a `role:"tool"` message. String outputs
/// pass through bare rather than JSON-quoted; anything else is sent as
/// its JSON text.
fn value_to_content(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl std::fmt::Display for AzureOpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "azure_openai({}, api_version={})",
            self.deployment, self.api_version
        )
    }
}

impl Backend for AzureOpenAiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let mut messages = Vec::new();
        if let Some(system) = request.system {
            messages.push(ApiMessage {
                role: "system",
                content: Some(system.to_string()),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        for msg in request.messages {
            Self::message_to_api(msg, &mut messages);
        }

        let tools: Vec<ApiTool> = request.tools.iter().map(Self::tool_to_api).collect();
        let tool_choice = (!tools.is_empty()).then_some("auto");

        let api_request = ApiRequest {
            messages,
            tools,
            tool_choice,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(deployment = %self.deployment, "chat completion request");

        let response = self
            .client
            .post(&self.url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::error_from_response(status.as_u16(), &body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let message = Self::response_to_message(choice.message);
        let usage = api_response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ModelResponse { message, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolError;
    use serde_json::json;

    fn credentials() -> Credentials {
        Credentials {
            endpoint: "https://example.openai.azure.com/".to_string(),
            api_key: "super-secret".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-15-preview".to_string(),
        }
    }

    #[test]
    fn url_targets_the_deployment() {
        let backend = AzureOpenAiBackend::new(&credentials());
        assert_eq!(
            backend.url,
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions"
        );
    }

    #[test]
    fn request_url_carries_api_version() {
        let backend = AzureOpenAiBackend::new(&credentials());
        let request = backend
            .client
            .post(&backend.url)
            .query(&[("api-version", backend.api_version.as_str())])
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("api-version=2024-02-15-preview"));
    }

    #[test]
    fn display_omits_api_key() {
        let backend = AzureOpenAiBackend::new(&credentials());
        let shown = backend.to_string();
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("gpt-4o"));
    }

    #[test]
    fn tool_results_become_tool_messages() {
        let message = Message::tool_results(vec![
            ToolResult::Success {
                tool_call_id: "call_1".into(),
                output: Value::String("plain text".into()),
            },
            ToolResult::Failure {
                tool_call_id: "call_2".into(),
                error: ToolError::NotFound("bogus".into()),
            },
        ]);

        let mut out = Vec::new();
        AzureOpenAiBackend::message_to_api(&message, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, "tool");
        assert_eq!(out[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(out[0].content.as_deref(), Some("plain text"));
        assert_eq!(out[1].tool_call_id.as_deref(), Some("call_2"));
        assert!(out[1].content.as_deref().unwrap().contains("tool not found"));
    }

    #[test]
    fn string_output_is_not_json_quoted() {
        assert_eq!(value_to_content(&Value::String("plain text".into())), "plain text");
        assert_eq!(
            value_to_content(&json!({"pages": ["s3-overview"]})),
            r#"{"pages":["s3-overview"]}"#
        );
    }

    #[test]
    fn assistant_tool_calls_serialize_arguments_as_string() {
        let message = Message {
            role: Role::Assistant,
            parts: vec![Part::ToolCall(ToolCall {
                id: "call_1".into(),
                name: "search_documentation".into(),
                arguments: json!({"search_phrase": "S3"}),
            })],
        };

        let mut out = Vec::new();
        AzureOpenAiBackend::message_to_api(&message, &mut out);

        let wire = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(wire["role"], "assistant");
        assert_eq!(
            wire["tool_calls"][0]["function"]["arguments"],
            json!(r#"{"search_phrase":"S3"}"#)
        );
        assert!(wire.get("content").is_none());
    }

    #[test]
    fn response_tool_call_arguments_parse_with_fallback() {
        let api: ApiResponseMessage = serde_json::from_str(
            r#"{
                "content": null,
                "tool_calls": [
                    {"id": "call_9", "type": "function",
                     "function": {"name": "search_documentation", "arguments": "{\"search_phrase\": \"S3\"}"}},
                    {"id": "call_10", "type": "function",
                     "function": {"name": "search_documentation", "arguments": "not json"}}
                ]
            }"#,
        )
        .unwrap();

        let message = AzureOpenAiBackend::response_to_message(api);
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, json!({"search_phrase": "S3"}));
        assert_eq!(calls[1].arguments, Value::String("not json".into()));
    }

    #[test]
    fn missing_tool_call_id_gets_generated() {
        let api: ApiResponseMessage = serde_json::from_str(
            r#"{"tool_calls": [{"function": {"name": "search_documentation", "arguments": "{}"}}]}"#,
        )
        .unwrap();

        let message = AzureOpenAiBackend::response_to_message(api);
        assert!(message.tool_calls()[0].id.starts_with("call_"));
    }

    #[test]
    fn rate_limit_detection() {
        let err = AzureOpenAiBackend::error_from_response(
            429,
            r#"{"error":{"message":"slow down","code":"429"}}"#,
        );
        assert!(err.is_rate_limit());

        let err = AzureOpenAiBackend::error_from_response(
            400,
            r#"{"error":{"message":"requests have exceeded the token rate limit","code":"RateLimitReached"}}"#,
        );
        assert!(err.is_rate_limit());

        let err = AzureOpenAiBackend::error_from_response(500, "internal error");
        assert!(!err.is_rate_limit());
        assert!(err.to_string().contains("500"));
    }
}
