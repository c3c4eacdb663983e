use thiserror::Error;
use crate::pipeline::category::JobCategory;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: invalid token '{token}'")]
    Parse { token: String },

    #[error("A {0} job is already running")]
    AlreadyRunning(JobCategory),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn parse(token: impl Into<String>) -> Self {
        EngineError::Parse { token: token.into() }
    }
}
