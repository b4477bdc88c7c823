//! Agent sessions: a model backend, a tool host, and an instruction bound
//! together.

use crate::config::Credentials;
use crate::model::{Backend, ToolSpec};
use crate::providers::AzureOpenAiBackend;
use crate::tools::ToolHost;
use crate::turn::{self, TurnOptions, TurnResult};
use serde::Serialize;
use uuid::Uuid;

/// Connection settings safe to show to users. Never carries the API key.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSettings {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub tool_count: usize,
}

/// A conversation session.
///
/// A session holds no turn state, so a shared reference can run turns
/// concurrently; each [`Session::run`] call gets its own history and
/// trace.
pub struct Session<B, H> {
    id: Uuid,
    backend: B,
    host: H,
    instruction: String,
    options: TurnOptions,
    settings: SessionSettings,
}

impl<H: ToolHost> Session<AzureOpenAiBackend, H> {
    /// Create a session against Azure OpenAI.
    pub fn create(credentials: &Credentials, host: H, instruction: impl Into<String>) -> Self {
        let settings = SessionSettings {
            endpoint: credentials.endpoint.clone(),
            deployment: credentials.deployment.clone(),
            api_version: credentials.api_version.clone(),
            tool_count: host.specs().len(),
        };
        Self::with_backend(
            AzureOpenAiBackend::new(credentials),
            host,
            instruction,
            settings,
        )
    }
}

impl<B: Backend, H: ToolHost> Session<B, H> {
    /// Create a session over an arbitrary backend.
    pub fn with_backend(
        backend: B,
        host: H,
        instruction: impl Into<String>,
        settings: SessionSettings,
    ) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, tools = settings.tool_count, "session created");
        Self {
            id,
            backend,
            host,
            instruction: instruction.into(),
            options: TurnOptions::default(),
            settings,
        }
    }

    pub fn with_options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The tool catalog this session was bound to at creation.
    pub fn tools(&self) -> &[ToolSpec] {
        self.host.specs()
    }

    /// Settings for display. The API key is deliberately absent.
    pub fn describe_settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Run one conversation turn.
    ///
    /// Failures are reported inside the returned [`TurnResult`] rather
    /// than as an `Err`, so a failed turn still carries its partial tool
    /// trace and token usage.
    pub async fn run(&self, query: &str) -> TurnResult {
        tracing::debug!(session = %self.id, "turn start");
        turn::run_turn(
            &self.backend,
            &self.host,
            &self.instruction,
            &self.options,
            query,
        )
        .await
    }

    /// Give the tool host back, consuming the session. Callers that need
    /// to close an MCP-backed host do so after the last turn.
    pub fn into_host(self) -> H {
        self.host
    }
}
