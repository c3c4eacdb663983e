use std::path::Path;
use crate::errors::EngineError;
use super::types::EngineConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::warn;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<EngineConfig, EngineError> {
    if !path.exists() {
        return Err(EngineError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(EngineError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<EngineConfig, EngineError> {
    // An empty document is a valid, all-defaults config
    if content.trim().is_empty() {
        return Ok(EngineConfig::default());
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;

    // JSON Schema validation
    validate_schema(&yaml)?;

    // Parse into typed config
    let config: EngineConfig = serde_yaml::from_value(yaml)?;

    // Semantic conflict detection
    validate_conflicts(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), EngineError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| EngineError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| EngineError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        // Advisory only, typed parsing below is the hard check
        for e in errors {
            warn!(validation_error = %e, path = %e.instance_path, "Config schema warning");
        }
    }

    Ok(())
}

/// Detect semantic conflicts in the parsed configuration.
fn validate_conflicts(config: &EngineConfig) -> Result<(), EngineError> {
    if config.defaults.concurrency == Some(0) {
        return Err(EngineError::Config("defaults.concurrency must be at least 1".into()));
    }
    if config.defaults.timeout_ms == Some(0) {
        return Err(EngineError::Config("defaults.timeout_ms must be at least 1".into()));
    }
    if config.defaults.script_timeout_secs == Some(0) {
        return Err(EngineError::Config("defaults.script_timeout_secs must be at least 1".into()));
    }

    if let Some(dir) = &config.dictionaries.dir {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Dictionary directory does not exist");
        }
    }

    if let Some(path) = &config.interpreter.path {
        if !path.exists() {
            warn!(path = %path.display(), "Configured interpreter not found, PATH lookup will be used");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config_str(
            "defaults:\n  concurrency: 32\n  timeout_ms: 800\nhttp:\n  user_agent: probe/1.0\nstorage:\n  database: /tmp/x.db\n",
        )
        .unwrap();
        assert_eq!(config.defaults.concurrency, Some(32));
        assert_eq!(config.http.user_agent, "probe/1.0");
        assert!(config.http.accept_invalid_certs);
        assert_eq!(config.concurrency_for(crate::pipeline::category::JobCategory::Liveness), 32);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config.script_timeout_secs(), 60);
        assert_eq!(
            config.timeout_ms_for(crate::pipeline::category::JobCategory::DirScan),
            5000
        );
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(matches!(
            parse_config_str("defaults:\n  concurrency: 0\n"),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            parse_config_str("defaults:\n  timeout_ms: 0\n"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(matches!(parse_config_str("defaults: [unclosed"), Err(EngineError::Yaml(_))));
    }

    #[tokio::test]
    async fn test_parse_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interpreter:\n  path: /usr/bin/python3").unwrap();
        let config = parse_config(file.path()).await.unwrap();
        assert!(config.interpreter.path.is_some());

        let missing = parse_config(Path::new("/nonexistent/jackal.yaml")).await;
        assert!(matches!(missing, Err(EngineError::Config(_))));
    }
}
