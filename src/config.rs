//! Configuration management for the tool loop agent.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Optional. Talk to OpenAI directly with this key.
//! - `BRAINTRUST_API_KEY` - Optional. Used with the Braintrust proxy when no OpenAI key is set.
//! - `LLM_API_BASE` - Optional. Override the chat-completions base URL.
//! - `AGENT_MODEL` - Optional. Model identifier. Defaults to `gpt-4o-mini`.
//! - `AGENT_MAX_ITERATIONS` - Optional. Iteration budget per run. Defaults to `10`.
//!
//! At least one of the two API keys must be set.

use thiserror::Error;

use crate::agent::CUSTOMER_SERVICE_PROMPT;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const BRAINTRUST_PROXY_BASE: &str = "https://api.braintrust.dev/v1/proxy";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which key authenticates model calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// An OpenAI key, used against the OpenAI API.
    Direct(String),
    /// A Braintrust key, used against the Braintrust proxy.
    Proxy(String),
}

impl Credentials {
    pub fn api_key(&self) -> &str {
        match self {
            Credentials::Direct(key) | Credentials::Proxy(key) => key,
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Credentials::Direct(_) => OPENAI_API_BASE,
            Credentials::Proxy(_) => BRAINTRUST_PROXY_BASE,
        }
    }
}

/// Where model calls go and how they authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub credentials: Credentials,

    /// Explicit base URL; wins over the credential's default endpoint.
    pub base_url_override: Option<String>,
}

impl EndpointConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url_override: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.credentials.default_base_url())
    }

    pub fn api_key(&self) -> &str {
        self.credentials.api_key()
    }

    /// Pick credentials from the two candidate keys.
    ///
    /// A non-empty OpenAI key always wins; otherwise a non-empty Braintrust key
    /// selects the proxy.
    pub fn resolve(
        openai_key: Option<String>,
        braintrust_key: Option<String>,
    ) -> Result<Credentials, ConfigError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(key) = non_empty(openai_key) {
            return Ok(Credentials::Direct(key));
        }
        if let Some(key) = non_empty(braintrust_key) {
            return Ok(Credentials::Proxy(key));
        }
        Err(ConfigError::MissingEnvVar(
            "OPENAI_API_KEY or BRAINTRUST_API_KEY".to_string(),
        ))
    }
}

/// Per-agent settings. Fixed for the lifetime of an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Model identifier passed to the endpoint
    pub model: String,

    /// First message of every transcript
    pub system_prompt: String,

    /// Maximum model calls per run (always at least 1)
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: CUSTOMER_SERVICE_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the iteration budget. Zero is raised to one.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub agent: AgentConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither API key is set, and
    /// `ConfigError::InvalidValue` for a malformed `AGENT_MAX_ITERATIONS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials =
            EndpointConfig::resolve(lookup("OPENAI_API_KEY"), lookup("BRAINTRUST_API_KEY"))?;

        let mut endpoint = EndpointConfig::new(credentials);
        if let Some(base) = lookup("LLM_API_BASE").filter(|s| !s.trim().is_empty()) {
            endpoint = endpoint.with_base_url(base.trim());
        }

        let model = lookup("AGENT_MODEL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let max_iterations = lookup("AGENT_MAX_ITERATIONS")
            .map(|v| parse_max_iterations(&v))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_ITERATIONS);

        Ok(Self {
            endpoint,
            agent: AgentConfig {
                model,
                max_iterations,
                ..Default::default()
            },
        })
    }
}

fn parse_max_iterations(value: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("AGENT_MAX_ITERATIONS".to_string(), reason);

    let parsed = value
        .trim()
        .parse::<usize>()
        .map_err(|e| invalid(e.to_string()))?;
    if parsed == 0 {
        return Err(invalid("must be a positive integer".to_string()));
    }
    Ok(parsed)
}
