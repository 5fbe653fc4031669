//! Service configuration
//!
//! Values are layered: serde defaults, then an optional TOML file, then
//! `VISION_RELAY__*` environment variables, then the provider variables
//! (`DASHSCOPE_API_KEY`, `DASHSCOPE_BASE_URL`, `VISION_MODEL`).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "VISION_RELAY_CONFIG";

const ENV_PREFIX: &str = "VISION_RELAY";

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the file named by `VISION_RELAY_CONFIG`
    /// (default `config.toml`, optional) and the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
        Self::from_file(&path)
    }

    /// Load configuration from a specific file; a missing file is not an error.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.gateway = config.gateway.from_env();
        Ok(config)
    }

    /// Socket address the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on request bodies (uploads and JSON)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_max_body_bytes() -> usize { 20 * 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Remote model provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// API key (read from env DASHSCOPE_API_KEY if not set)
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// OpenAI-compatible base URL, without the `/chat/completions` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Upper bound on reasoning tokens the model may spend
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,

    /// Ask the provider for a trailing usage chunk
    #[serde(default = "default_include_usage")]
    pub include_usage: bool,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Longest wait for response headers once the request is sent; 0 waits forever
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_base_url() -> String { "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string() }
fn default_model() -> String { "qwen3-vl-plus".to_string() }
fn default_thinking_budget() -> u32 { 81920 }
fn default_include_usage() -> bool { true }
fn default_connect_timeout_ms() -> u64 { 10_000 }
fn default_response_timeout_ms() -> u64 { 60_000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            thinking_budget: default_thinking_budget(),
            include_usage: default_include_usage(),
            connect_timeout_ms: default_connect_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl GatewayConfig {
    /// Override with the provider environment variables if present
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("DASHSCOPE_API_KEY") {
            if !val.is_empty() {
                self.api_key = Some(SecretString::new(val));
            }
        }

        if let Ok(val) = std::env::var("DASHSCOPE_BASE_URL") {
            if !val.is_empty() {
                self.base_url = val;
            }
        }

        if let Ok(val) = std::env::var("VISION_MODEL") {
            if !val.is_empty() {
                self.model = val;
            }
        }

        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms))
    }

    /// Full URL of the streaming chat-completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Upload normalization settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_max_dimension() -> u32 { 1024 }
fn default_jpeg_quality() -> u8 { 85 }

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Streaming relay settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Longest wait for the next upstream chunk before the stream is abandoned
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 { 120 }

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl RelayConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}
