//! Startup configuration, read once from the environment (and `.env`).

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

pub const PLAYWRIGHT_SERVER: &str = "playwright";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_PLAYWRIGHT_URL: &str = "http://localhost:8931/mcp";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing GEMINI_API_KEY in environment or .env file")]
    MissingApiKey,
    #[error("unknown MCP transport '{0}' (expected streamable_http or http)")]
    UnknownTransport(String),
    #[error("invalid GEMINI_TEMPERATURE '{0}'")]
    InvalidTemperature(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    StreamableHttp,
    Http,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "streamable_http" | "streamable-http" => Ok(TransportKind::StreamableHttp),
            "http" => Ok(TransportKind::Http),
            other => Err(ConfigError::UnknownTransport(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    pub url: String,
    pub transport: TransportKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReasonerConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub reasoner: ReasonerConfig,
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let temperature = match lookup("GEMINI_TEMPERATURE") {
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidTemperature(raw.clone()))?,
            None => DEFAULT_TEMPERATURE,
        };

        let transport = match lookup("MCP_PLAYWRIGHT_TRANSPORT") {
            Some(raw) => raw.parse()?,
            None => TransportKind::default(),
        };

        let mut mcp_servers = HashMap::new();
        mcp_servers.insert(
            PLAYWRIGHT_SERVER.to_string(),
            McpServerConfig {
                url: lookup("MCP_PLAYWRIGHT_URL").unwrap_or_else(|| DEFAULT_PLAYWRIGHT_URL.into()),
                transport,
            },
        );

        Ok(Self {
            reasoner: ReasonerConfig {
                api_key,
                model: lookup("GEMINI_MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.into()),
                base_url: lookup("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into()),
                temperature,
            },
            mcp_servers,
        })
    }
}
