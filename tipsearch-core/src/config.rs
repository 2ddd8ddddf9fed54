use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TipsearchConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

/// Connection settings for the search database pool.
///
/// `url` must point at the dedicated read-only login scoped to the
/// `tip_reports` table, never at the credential the CRUD resources use.
/// The gate in `crate::gate` is the first defense against a prompt-injected
/// write; this login is the second, and both are load-bearing.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Hosted generation model settings. The API key is not part of the file
/// config; it comes from the `ANTHROPIC_API_KEY` environment variable.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

impl TipsearchConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
