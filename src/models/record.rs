use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::pipeline::category::JobCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

/// How a live host answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AliveMethod {
    Icmp,
    Tcp { port: u16 },
}

impl std::fmt::Display for AliveMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Icmp => f.write_str("icmp"),
            Self::Tcp { port } => write!(f, "tcp/{}", port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretHit {
    pub rule: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PocMode {
    Template,
    Script,
}

/// A single finding. Emitted once and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultRecord {
    Alive {
        host: String,
        method: AliveMethod,
        rtt_ms: u64,
        timestamp: DateTime<Utc>,
    },
    OpenPort {
        host: String,
        port: u16,
        transport: Transport,
        state: String,
        rtt_ms: u64,
        service: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        banner: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Path {
        url: String,
        status: u16,
        size: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Credential {
        host: String,
        port: u16,
        service: String,
        username: String,
        password: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    JsAsset {
        source: String,
        endpoints: Vec<String>,
        scripts: Vec<String>,
        secrets: Vec<SecretHit>,
        timestamp: DateTime<Utc>,
    },
    VerifiedEndpoint {
        url: String,
        status: u16,
        timestamp: DateTime<Utc>,
    },
    Poc {
        mode: PocMode,
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        matched: Option<bool>,
        transcript: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ResultRecord {
    pub fn category(&self) -> JobCategory {
        match self {
            Self::Alive { .. } => JobCategory::Liveness,
            Self::OpenPort { .. } => JobCategory::PortScan,
            Self::Path { .. } => JobCategory::DirScan,
            Self::Credential { .. } => JobCategory::CredentialBruteForce,
            Self::JsAsset { .. } | Self::VerifiedEndpoint { .. } => JobCategory::JsMine,
            Self::Poc { .. } => JobCategory::PocVerify,
        }
    }

    /// The host, URL or target the record is about.
    pub fn subject(&self) -> String {
        match self {
            Self::Alive { host, .. } => host.clone(),
            Self::OpenPort { host, port, .. } => format!("{}:{}", host, port),
            Self::Path { url, .. } => url.clone(),
            Self::Credential { host, port, .. } => format!("{}:{}", host, port),
            Self::JsAsset { source, .. } => source.clone(),
            Self::VerifiedEndpoint { url, .. } => url.clone(),
            Self::Poc { target, .. } => target.clone(),
        }
    }

    /// One-line human summary used by log lines and the CLI renderer.
    pub fn summary(&self) -> String {
        match self {
            Self::Alive { host, method, rtt_ms, .. } => {
                format!("{} alive ({}, {}ms)", host, method, rtt_ms)
            }
            Self::OpenPort { host, port, transport, service, banner, .. } => match banner {
                Some(b) => format!("{}:{}/{} open {} | {}", host, port, transport, service, b),
                None => format!("{}:{}/{} open {}", host, port, transport, service),
            },
            Self::Path { url, status, size, title, .. } => match title {
                Some(t) => format!("[{}] {} ({} bytes) {}", status, url, size, t),
                None => format!("[{}] {} ({} bytes)", status, url, size),
            },
            Self::Credential { host, port, service, username, password, .. } => {
                format!("{}://{}:{} {} / {}", service, host, port, username, password)
            }
            Self::JsAsset { source, endpoints, scripts, secrets, .. } => format!(
                "{}: {} endpoints, {} scripts, {} secrets",
                source,
                endpoints.len(),
                scripts.len(),
                secrets.len()
            ),
            Self::VerifiedEndpoint { url, status, .. } => format!("[{}] {}", status, url),
            Self::Poc { target, matched, error, .. } => match (matched, error) {
                (_, Some(e)) => format!("{} error: {}", target, e),
                (Some(true), _) => format!("{} matched", target),
                (Some(false), _) => format!("{} not matched", target),
                (None, _) => format!("{} executed", target),
            },
        }
    }
}
