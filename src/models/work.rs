use serde::{Deserialize, Serialize};
use crate::models::record::Transport;
use crate::probes::credential::Service;

/// One (target, port) probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortItem {
    pub host: String,
    pub port: u16,
    pub transport: Transport,
}

/// One (base URL, dictionary path) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathItem {
    pub base_url: String,
    pub path: String,
    pub depth: u32,
}

impl PathItem {
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.path.trim_start_matches('/'))
    }
}

/// A service endpoint that credentials are tried against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialTarget {
    pub host: String,
    pub port: u16,
    pub service: Service,
}

impl std::fmt::Display for CredentialTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.service, self.host, self.port)
    }
}

/// One (target, username, password) attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialItem {
    pub target: CredentialTarget,
    pub username: String,
    pub password: String,
}

/// One URL to fetch while mining scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlItem {
    pub url: String,
    pub depth: u32,
}
