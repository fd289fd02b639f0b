//! Configuration file and environment support

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scout_ai::Model;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(
        "No LLM credentials configured. Set AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT and \
         AZURE_OPENAI_DEPLOYMENT_NAME, or OPENAI_API_KEY"
    )]
    MissingCredentials,
}

/// Configuration for the scout server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    /// Human-readable logs instead of JSON lines
    pub debug: bool,
    pub log_level: String,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "AI Agent Project".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            debug: true,
            log_level: "INFO".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8501".to_string(),
            ],
            llm: LlmConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// LLM endpoint configuration. Azure is used when its key, endpoint and
/// deployment are all set; otherwise the OpenAI-compatible settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub azure_api_key: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_api_version: String,
    pub azure_deployment: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Transport-level retries of a failed LLM call
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            azure_api_key: None,
            azure_endpoint: None,
            azure_api_version: "2024-02-01".to_string(),
            azure_deployment: None,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 4000,
            timeout_secs: 60,
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    /// Resolve the model to call and the key to call it with
    pub fn model_and_key(&self) -> Result<(Model, String), ConfigError> {
        if let (Some(key), Some(endpoint), Some(deployment)) = (
            &self.azure_api_key,
            &self.azure_endpoint,
            &self.azure_deployment,
        ) {
            let model = Model::azure(endpoint, deployment, &self.azure_api_version)
                .with_max_tokens(self.max_tokens);
            return Ok((model, key.clone()));
        }

        if let Some(key) = &self.openai_api_key {
            let model = Model::openai(&self.openai_model, &self.openai_base_url)
                .with_max_tokens(self.max_tokens);
            return Ok((model, key.clone()));
        }

        Err(ConfigError::MissingCredentials)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Enables the `tavily_search` tool
    pub tavily_api_key: Option<String>,
    pub timeout_secs: u64,
    /// The only directory `file_handler` may write into
    pub workspace_dir: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            timeout_secs: 30,
            workspace_dir: PathBuf::from("./workspace"),
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scout")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SCOUT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load from `path`, or from the default location when `None`. A missing
    /// default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Overlay environment variables; they win over file values
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AZURE_OPENAI_API_KEY") {
            self.llm.azure_api_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.llm.azure_endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            self.llm.azure_api_version = v;
        }
        if let Some(v) = get("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.llm.azure_deployment = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.llm.openai_base_url = v;
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.llm.openai_model = v;
        }
        if let Some(v) = get("TAVILY_API_KEY") {
            self.tools.tavily_api_key = Some(v);
        }
        if let Some(v) = get("SCOUT_HOST").or_else(|| get("FASTAPI_HOST")) {
            self.host = v;
        }
        if let Some(v) = get("SCOUT_PORT").or_else(|| get("FASTAPI_PORT")) {
            match v.trim().parse() {
                Ok(port) => self.port = port,
                Err(_) => eprintln!("Warning: ignoring invalid port: {}", v),
            }
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = get("DEBUG") {
            self.debug = matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = get("CORS_ORIGINS") {
            self.cors_origins = parse_origins(&v);
        }
    }

    /// Load the file, then overlay the process environment
    pub fn from_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }
}

/// Accepts a JSON array or a comma-separated list
fn parse_origins(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.starts_with('[') {
        if let Ok(origins) = serde_json::from_str::<Vec<String>>(value) {
            return origins;
        }
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# scout configuration file
# Place at ~/.config/scout/config.toml or point SCOUT_CONFIG_PATH at it.
# Environment variables (and a .env file) override these values.

app_name = "AI Agent Project"
host = "0.0.0.0"
port = 8000

# Human-readable logs; JSON lines when false
debug = true
log_level = "INFO"

cors_origins = ["http://localhost:3000", "http://localhost:8501"]

[llm]
# Azure OpenAI is used when key, endpoint and deployment are all set
# azure_api_key = "..."
# azure_endpoint = "https://my-resource.openai.azure.com"
azure_api_version = "2024-02-01"
# azure_deployment = "gpt-4o"

# Otherwise any OpenAI-compatible endpoint
# openai_api_key = "sk-..."
openai_base_url = "https://api.openai.com/v1"
openai_model = "gpt-4o-mini"

temperature = 0.1
max_tokens = 4000
timeout_secs = 60
max_retries = 0

[tools]
# tavily_api_key = "tvly-..."
timeout_secs = 30
workspace_dir = "./workspace"
"#
}
