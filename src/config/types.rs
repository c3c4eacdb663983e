use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::pipeline::category::JobCategory;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Engine-wide settings, loaded once from `--config`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub dictionaries: DictionariesConfig,
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl EngineConfig {
    /// Concurrency for a job that did not set one.
    pub fn concurrency_for(&self, category: JobCategory) -> usize {
        self.defaults
            .concurrency
            .unwrap_or(category.definition().default_concurrency)
    }

    pub fn timeout_ms_for(&self, category: JobCategory) -> u64 {
        self.defaults
            .timeout_ms
            .unwrap_or(category.definition().default_timeout_ms)
    }

    pub fn script_timeout_secs(&self) -> u64 {
        self.defaults
            .script_timeout_secs
            .unwrap_or(DEFAULT_SCRIPT_TIMEOUT_SECS)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DefaultsConfig {
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub script_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DictionariesConfig {
    /// Directory relative dictionary names resolve against.
    pub dir: Option<PathBuf>,
    pub users: Option<String>,
    pub passwords: Option<String>,
    pub directories: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct InterpreterConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_body_bytes: default_max_body_bytes(),
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StorageConfig {
    /// SQLite file for the result recorder. Recording is off when unset.
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { channel_capacity: default_channel_capacity() }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_channel_capacity() -> usize {
    crate::events::bus::DEFAULT_CHANNEL_CAPACITY
}

fn default_true() -> bool {
    true
}
