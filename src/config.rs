use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Journal backend: `"jsonl"` or `"none"`.
    #[serde(default = "default_journal")]
    pub journal: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> sessionlog_store::RetryPolicy {
        sessionlog_store::RetryPolicy {
            attempts: self.attempts,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            journal: default_journal(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Default functions
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_journal() -> String {
    "jsonl".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    25
}

/// Load config from TOML file with env var overrides.
pub fn load(path: &str) -> anyhow::Result<ServerConfig> {
    let content = if std::path::Path::new(path).exists() {
        std::fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?
    } else {
        tracing::warn!("Config file not found at {}, using defaults", path);
        String::new()
    };

    let mut config: ServerConfig =
        toml::from_str(&content).with_context(|| format!("failed to parse config {path}"))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())
        .context("invalid environment override")?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut ServerConfig, var: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = var("SESSIONLOG_HOST") {
        config.host = v;
    }
    if let Some(v) = var("SESSIONLOG_PORT") {
        config.port = v
            .parse()
            .with_context(|| format!("SESSIONLOG_PORT is not a port number: {v:?}"))?;
    }
    if let Some(v) = var("SESSIONLOG_DATA_DIR") {
        config.data_dir = PathBuf::from(v);
    }
    if let Some(v) = var("SESSIONLOG_JOURNAL") {
        config.journal = v;
    }
    Ok(())
}
