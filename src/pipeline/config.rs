use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::http::{normalize_base_url, parse_target_url};
use crate::models::work::CredentialTarget;
use crate::probes::credential::Service;
use crate::probes::liveness::DEFAULT_TCP_PING_PORTS;
use crate::probes::poc::{PocSource, Template};
use crate::targets::dictionary::{expand_extensions, merge_with_builtin};
use crate::targets::{DictionaryKind, DictionarySource, PortSet, TargetSet};
use super::category::JobCategory;

fn default_true() -> bool {
    true
}

fn default_ports() -> String {
    "common".to_string()
}

/// Per-job configuration as submitted by the CLI or the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum JobConfig {
    Liveness(LivenessConfig),
    PortScan(PortScanConfig),
    DirScan(DirScanConfig),
    CredentialBruteForce(BruteForceConfig),
    JsMine(JsMineConfig),
    PocVerify(PocConfig),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LivenessConfig {
    pub target: String,
    #[serde(default, alias = "threads")]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub enable_icmp: bool,
    #[serde(default = "default_true")]
    pub enable_tcp_ping: bool,
    #[serde(default)]
    pub tcp_ping_ports: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortScanConfig {
    pub target: String,
    #[serde(default = "default_ports")]
    pub ports: String,
    #[serde(default, alias = "threads")]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
    /// Sweep hosts first and only scan the ones that answer.
    #[serde(default)]
    pub alive_check: bool,
    #[serde(default = "default_true", alias = "enable_ping")]
    pub enable_icmp: bool,
    #[serde(default = "default_true")]
    pub fingerprint: bool,
    #[serde(default)]
    pub enable_udp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirScanConfig {
    pub target: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default, alias = "threads")]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub exclude_404: bool,
    #[serde(default, alias = "redirects")]
    pub follow_redirects: bool,
    #[serde(default, alias = "custom_dict")]
    pub dictionary: Option<String>,
    #[serde(default)]
    pub recursion_depth: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BruteForceConfig {
    /// Explicit service endpoints.
    #[serde(default)]
    pub targets: Vec<CredentialTarget>,
    /// Host expression combined with `protocols` at their default ports.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default, alias = "threads")]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub user_dict: Option<String>,
    #[serde(default)]
    pub pass_dict: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsMineConfig {
    pub target: String,
    #[serde(default, alias = "threads")]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub deep_scan: bool,
    #[serde(default)]
    pub active_scan: bool,
    #[serde(default = "default_true")]
    pub danger_filter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PocSourceConfig {
    Template { content: String },
    Script {
        content: String,
        #[serde(default)]
        interpreter: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PocConfig {
    pub target: String,
    pub source: PocSourceConfig,
    /// Per-request deadline for templates.
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
    /// Wall-clock limit for scripts.
    #[serde(default)]
    pub script_timeout_secs: Option<u64>,
}

/// Work plan derived from a validated config.
#[derive(Debug, Clone)]
pub enum JobPlan {
    Liveness {
        targets: TargetSet,
        enable_icmp: bool,
        enable_tcp_ping: bool,
        tcp_ping_ports: Vec<u16>,
    },
    PortScan {
        targets: TargetSet,
        ports: PortSet,
        alive_check: bool,
        enable_icmp: bool,
        fingerprint: bool,
        enable_udp: bool,
    },
    DirScan {
        bases: Vec<String>,
        paths: Arc<[String]>,
        exclude_404: bool,
        follow_redirects: bool,
        recursion_depth: u32,
    },
    CredentialBruteForce {
        targets: Vec<CredentialTarget>,
        users: Arc<[String]>,
        passwords: Arc<[String]>,
    },
    JsMine {
        seed: Url,
        deep_scan: bool,
        active_scan: bool,
        danger_filter: bool,
    },
    PocVerify {
        target: String,
        source: PocSource,
        script_timeout: Duration,
    },
}

/// A job that passed validation. Immutable once built.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    pub category: JobCategory,
    /// Human-readable target summary for status and persistence.
    pub target: String,
    pub concurrency: usize,
    pub timeout: Duration,
    pub plan: JobPlan,
}

fn require_target(target: &str) -> Result<&str, EngineError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        Err(EngineError::Config("Target is empty".into()))
    } else {
        Ok(trimmed)
    }
}

fn resolve_limits(
    engine: &EngineConfig,
    category: JobCategory,
    concurrency: Option<usize>,
    timeout_ms: Option<u64>,
) -> Result<(usize, Duration), EngineError> {
    let concurrency = concurrency.unwrap_or_else(|| engine.concurrency_for(category));
    if concurrency == 0 {
        return Err(EngineError::Config("Concurrency must be greater than 0".into()));
    }
    let timeout_ms = timeout_ms.unwrap_or_else(|| engine.timeout_ms_for(category));
    if timeout_ms == 0 {
        return Err(EngineError::Config("Timeout must be greater than 0".into()));
    }
    Ok((concurrency, Duration::from_millis(timeout_ms)))
}

/// Expression errors surface as configuration errors from `start`.
fn as_config(err: EngineError) -> EngineError {
    match err {
        EngineError::Parse { token } => EngineError::Config(format!("Invalid expression token '{}'", token)),
        other => other,
    }
}

impl JobConfig {
    /// Parse an API body for `category`; the body itself carries no tag.
    pub fn from_json(category: JobCategory, mut body: serde_json::Value) -> Result<Self, EngineError> {
        let serde_json::Value::Object(map) = &mut body else {
            return Err(EngineError::Config("Job config must be a JSON object".into()));
        };
        map.insert("category".into(), serde_json::Value::String(category.as_str().into()));
        serde_json::from_value(body).map_err(|e| EngineError::Config(format!("Invalid {} config: {}", category, e)))
    }

    pub fn category(&self) -> JobCategory {
        match self {
            JobConfig::Liveness(_) => JobCategory::Liveness,
            JobConfig::PortScan(_) => JobCategory::PortScan,
            JobConfig::DirScan(_) => JobCategory::DirScan,
            JobConfig::CredentialBruteForce(_) => JobCategory::CredentialBruteForce,
            JobConfig::JsMine(_) => JobCategory::JsMine,
            JobConfig::PocVerify(_) => JobCategory::PocVerify,
        }
    }

    /// Check everything that can be checked before any work starts and
    /// resolve dictionaries, expressions and defaults.
    pub async fn validate(
        &self,
        engine: &EngineConfig,
        dictionaries: &dyn DictionarySource,
    ) -> Result<ValidatedJob, EngineError> {
        let category = self.category();
        match self {
            JobConfig::Liveness(c) => {
                let target = require_target(&c.target)?;
                let (concurrency, timeout) = resolve_limits(engine, category, c.concurrency, c.timeout_ms)?;
                if !c.enable_icmp && !c.enable_tcp_ping {
                    return Err(EngineError::Config("Enable ICMP or TCP ping".into()));
                }
                let tcp_ping_ports = match c.tcp_ping_ports.as_deref() {
                    Some(expr) if !expr.trim().is_empty() => {
                        PortSet::parse(expr).map_err(as_config)?.as_slice().to_vec()
                    }
                    _ => DEFAULT_TCP_PING_PORTS.to_vec(),
                };
                Ok(ValidatedJob {
                    category,
                    target: target.to_string(),
                    concurrency,
                    timeout,
                    plan: JobPlan::Liveness {
                        targets: TargetSet::parse(target).map_err(as_config)?,
                        enable_icmp: c.enable_icmp,
                        enable_tcp_ping: c.enable_tcp_ping,
                        tcp_ping_ports,
                    },
                })
            }
            JobConfig::PortScan(c) => {
                let target = require_target(&c.target)?;
                let (concurrency, timeout) = resolve_limits(engine, category, c.concurrency, c.timeout_ms)?;
                Ok(ValidatedJob {
                    category,
                    target: target.to_string(),
                    concurrency,
                    timeout,
                    plan: JobPlan::PortScan {
                        targets: TargetSet::parse(target).map_err(as_config)?,
                        ports: PortSet::parse(&c.ports).map_err(as_config)?,
                        alive_check: c.alive_check,
                        enable_icmp: c.enable_icmp,
                        fingerprint: c.fingerprint,
                        enable_udp: c.enable_udp,
                    },
                })
            }
            JobConfig::DirScan(c) => {
                let target = require_target(&c.target)?;
                let (concurrency, timeout) = resolve_limits(engine, category, c.concurrency, c.timeout_ms)?;
                let bases = target
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| normalize_base_url(t).map_err(as_config))
                    .collect::<Result<Vec<_>, _>>()?;

                let name = c.dictionary.as_deref().or(engine.dictionaries.directories.as_deref());
                let lines = dictionaries.load(name, DictionaryKind::Directories).await?;
                let paths = expand_extensions(&lines, &c.extensions);
                if paths.is_empty() {
                    return Err(EngineError::Config("Directory dictionary has no usable entries".into()));
                }
                Ok(ValidatedJob {
                    category,
                    target: target.to_string(),
                    concurrency,
                    timeout,
                    plan: JobPlan::DirScan {
                        bases,
                        paths: paths.into(),
                        exclude_404: c.exclude_404,
                        follow_redirects: c.follow_redirects,
                        recursion_depth: c.recursion_depth,
                    },
                })
            }
            JobConfig::CredentialBruteForce(c) => {
                let (concurrency, timeout) = resolve_limits(engine, category, c.concurrency, c.timeout_ms)?;
                let targets = brute_force_targets(c)?;

                let user_name = c.user_dict.as_deref().or(engine.dictionaries.users.as_deref());
                let pass_name = c.pass_dict.as_deref().or(engine.dictionaries.passwords.as_deref());
                let users = dictionaries.load(user_name, DictionaryKind::Usernames).await?;
                let passwords = dictionaries.load(pass_name, DictionaryKind::Passwords).await?;

                Ok(ValidatedJob {
                    category,
                    target: summarize_targets(&targets),
                    concurrency,
                    timeout,
                    plan: JobPlan::CredentialBruteForce {
                        targets,
                        users: merge_with_builtin(&users, &DictionaryKind::Usernames.builtin()),
                        passwords: merge_with_builtin(&passwords, &DictionaryKind::Passwords.builtin()),
                    },
                })
            }
            JobConfig::JsMine(c) => {
                let target = require_target(&c.target)?;
                let (concurrency, timeout) = resolve_limits(engine, category, c.concurrency, c.timeout_ms)?;
                let seed = parse_target_url(target).map_err(as_config)?;
                Ok(ValidatedJob {
                    category,
                    target: seed.to_string(),
                    concurrency,
                    timeout,
                    plan: JobPlan::JsMine {
                        seed,
                        deep_scan: c.deep_scan,
                        active_scan: c.active_scan,
                        danger_filter: c.danger_filter,
                    },
                })
            }
            JobConfig::PocVerify(c) => {
                let target = require_target(&c.target)?;
                let (_, timeout) = resolve_limits(engine, category, Some(1), c.timeout_ms)?;
                let script_secs = c.script_timeout_secs.unwrap_or_else(|| engine.script_timeout_secs());
                if script_secs == 0 {
                    return Err(EngineError::Config("Script timeout must be greater than 0".into()));
                }
                let source = match &c.source {
                    PocSourceConfig::Template { content } => PocSource::Template(Arc::new(Template::parse(content)?)),
                    PocSourceConfig::Script { content, interpreter } => {
                        if content.trim().is_empty() {
                            return Err(EngineError::Config("Script is empty".into()));
                        }
                        PocSource::Script {
                            content: content.clone(),
                            interpreter: interpreter.clone(),
                        }
                    }
                };
                let target = match source {
                    PocSource::Template(_) => normalize_base_url(target).map_err(as_config)?,
                    PocSource::Script { .. } => target.to_string(),
                };
                Ok(ValidatedJob {
                    category,
                    target: target.clone(),
                    concurrency: 1,
                    timeout,
                    plan: JobPlan::PocVerify {
                        target,
                        source,
                        script_timeout: Duration::from_secs(script_secs),
                    },
                })
            }
        }
    }
}

fn brute_force_targets(c: &BruteForceConfig) -> Result<Vec<CredentialTarget>, EngineError> {
    let services = c
        .protocols
        .iter()
        .map(|p| p.parse::<Service>())
        .collect::<Result<Vec<_>, _>>()?;

    // An explicit protocol selection also narrows the explicit endpoints
    let mut targets: Vec<CredentialTarget> = c
        .targets
        .iter()
        .filter(|t| services.is_empty() || services.contains(&t.service))
        .cloned()
        .collect();
    if let Some(expr) = c.target.as_deref().filter(|t| !t.trim().is_empty()) {
        if services.is_empty() {
            return Err(EngineError::Config("No protocols selected".into()));
        }
        let hosts = TargetSet::parse(expr).map_err(as_config)?;
        for host in hosts.iter() {
            for service in &services {
                targets.push(CredentialTarget {
                    host: host.clone(),
                    port: service.default_port(),
                    service: *service,
                });
            }
        }
    }

    if targets.is_empty() {
        return Err(EngineError::Config("Target is empty".into()));
    }
    if let Some(bad) = targets.iter().find(|t| t.host.trim().is_empty() || t.port == 0) {
        return Err(EngineError::Config(format!("Invalid credential target {}", bad)));
    }
    let mut seen = std::collections::HashSet::new();
    targets.retain(|t| seen.insert(t.clone()));
    Ok(targets)
}

fn summarize_targets(targets: &[CredentialTarget]) -> String {
    match targets {
        [single] => single.to_string(),
        [first, rest @ ..] => format!("{} (+{} more)", first, rest.len()),
        [] => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::FileDictionaries;
    use serde_json::json;

    async fn validate(config: JobConfig) -> Result<ValidatedJob, EngineError> {
        config.validate(&EngineConfig::default(), &FileDictionaries::default()).await
    }

    #[tokio::test]
    async fn test_from_json_applies_defaults() {
        let config = JobConfig::from_json(JobCategory::PortScan, json!({ "target": "127.0.0.1" })).unwrap();
        let JobConfig::PortScan(ref c) = config else { panic!("wrong variant") };
        assert_eq!(c.ports, "common");
        assert!(c.fingerprint);

        let job = validate(config).await.unwrap();
        assert_eq!(job.concurrency, JobCategory::PortScan.definition().default_concurrency);
        assert_eq!(job.timeout, Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn test_rejects_invalid_configs() {
        let empty = JobConfig::from_json(JobCategory::Liveness, json!({ "target": "  " })).unwrap();
        assert!(matches!(validate(empty).await, Err(EngineError::Config(_))));

        let zero = JobConfig::from_json(JobCategory::Liveness, json!({ "target": "127.0.0.1", "concurrency": 0 })).unwrap();
        assert!(matches!(validate(zero).await, Err(EngineError::Config(_))));

        let bad_ports = JobConfig::from_json(JobCategory::PortScan, json!({ "target": "h", "ports": "90-80" })).unwrap();
        assert!(matches!(validate(bad_ports).await, Err(EngineError::Config(_))));

        let unknown = JobConfig::from_json(
            JobCategory::CredentialBruteForce,
            json!({ "target": "10.0.0.1", "protocols": ["ssh-ish"] }),
        )
        .unwrap();
        assert!(matches!(validate(unknown).await, Err(EngineError::Config(_))));

        let missing_dict = JobConfig::from_json(
            JobCategory::DirScan,
            json!({ "target": "http://h", "dictionary": "/nonexistent/dirs.txt" }),
        )
        .unwrap();
        assert!(matches!(validate(missing_dict).await, Err(EngineError::Config(_))));

        let empty_script = JobConfig::from_json(
            JobCategory::PocVerify,
            json!({ "target": "http://h", "source": { "mode": "script", "content": "  " } }),
        )
        .unwrap();
        assert!(matches!(validate(empty_script).await, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn test_brute_force_expands_protocols() {
        let config = JobConfig::from_json(
            JobCategory::CredentialBruteForce,
            json!({ "target": "10.0.0.1-2", "protocols": ["ftp", "redis"] }),
        )
        .unwrap();
        let job = validate(config).await.unwrap();
        let JobPlan::CredentialBruteForce { targets, users, .. } = job.plan else { panic!("wrong plan") };
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[1].service, Service::Redis);
        assert_eq!(targets[1].port, 6379);
        assert!(users.iter().any(|u| u == "root"));
    }

    #[tokio::test]
    async fn test_protocols_filter_explicit_targets() {
        let config = JobConfig::from_json(
            JobCategory::CredentialBruteForce,
            json!({
                "targets": [
                    { "host": "10.0.0.1", "port": 21, "service": "ftp" },
                    { "host": "10.0.0.1", "port": 6379, "service": "redis" },
                    { "host": "10.0.0.2", "port": 2121, "service": "ftp" }
                ],
                "protocols": ["FTP"]
            }),
        )
        .unwrap();
        let job = validate(config).await.unwrap();
        let JobPlan::CredentialBruteForce { targets, .. } = job.plan else { panic!("wrong plan") };
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.service == Service::Ftp));

        let nothing_left = JobConfig::from_json(
            JobCategory::CredentialBruteForce,
            json!({
                "targets": [{ "host": "10.0.0.1", "port": 6379, "service": "redis" }],
                "protocols": ["ftp"]
            }),
        )
        .unwrap();
        assert!(matches!(validate(nothing_left).await, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn test_dir_scan_expands_extensions() {
        let config = JobConfig::from_json(
            JobCategory::DirScan,
            json!({ "target": "example.test", "extensions": ["php"] }),
        )
        .unwrap();
        let job = validate(config).await.unwrap();
        let JobPlan::DirScan { bases, paths, .. } = job.plan else { panic!("wrong plan") };
        assert_eq!(bases, vec!["http://example.test"]);
        assert!(paths.iter().any(|p| p.ends_with(".php")));
        assert!(!paths.iter().any(|p| p.contains("%EXT%")));
    }

    #[tokio::test]
    async fn test_js_seed_keeps_trailing_slash() {
        let config = JobConfig::from_json(JobCategory::JsMine, json!({ "target": "h.test/app/" })).unwrap();
        let job = validate(config).await.unwrap();
        let JobPlan::JsMine { seed, .. } = job.plan else { panic!("wrong plan") };
        assert_eq!(seed.as_str(), "http://h.test/app/");
        assert_eq!(job.target, "http://h.test/app/");
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(JobConfig::from_json(JobCategory::JsMine, json!(["x"])).is_err());
    }
}
