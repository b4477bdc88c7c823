//! Configuration from the process environment.
//!
//! Every setting comes in through environment variables; `.env` loading is
//! the binary's concern, this module only reads what it is given. The
//! `from_lookup` constructors exist so tests can supply an environment
//! without touching the real one.

use thiserror::Error;

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_MCP_PACKAGE: &str = "MCP_SERVER_PACKAGE";

/// Package launched via `uvx` when `MCP_SERVER_PACKAGE` is not set.
pub const DEFAULT_MCP_PACKAGE: &str = "awslabs.aws-documentation-mcp-server@latest";

/// Azure OpenAI credentials.
///
/// All four values are required, including the API version; a
/// misconfigured environment fails at startup rather than at the first
/// model call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut take = |name: &'static str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let endpoint = take(ENV_ENDPOINT);
        let api_key = take(ENV_API_KEY);
        let deployment = take(ENV_DEPLOYMENT);
        let api_version = take(ENV_API_VERSION);

        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }
        if reqwest::Url::parse(&endpoint).is_err() {
            return Err(ConfigError::InvalidEndpoint(endpoint));
        }

        Ok(Self {
            endpoint,
            api_key,
            deployment,
            api_version,
        })
    }
}

// The API key stays out of Debug output so credentials can appear in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[redacted]")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Tool provider launch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpSettings {
    pub package: String,
}

impl McpSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let package = lookup(ENV_MCP_PACKAGE)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MCP_PACKAGE.to_string());
        Self { package }
    }

    /// Launch configuration for the provider process.
    pub fn server_config(&self) -> mcp::ServerConfig {
        mcp::ServerConfig::new(self.package.clone(), "uvx").arg(self.package.clone())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required variables are unset or blank.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<&'static str>),

    #[error("AZURE_OPENAI_ENDPOINT is not a valid URL: {0}")]
    InvalidEndpoint(String),
}
