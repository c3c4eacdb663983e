pub mod ftp;
pub mod http_basic;
pub mod mail;
pub mod mysql;
pub mod postgres;
pub mod redis;
pub mod ssh;
pub mod telnet;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashSet;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::errors::EngineError;
use crate::models::record::ResultRecord;
use crate::models::work::{CredentialItem, CredentialTarget};
use super::{Probe, ProbeContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    Ssh,
    Ftp,
    Mysql,
    Postgres,
    Redis,
    Telnet,
    Pop3,
    Imap,
    Smtp,
    HttpBasic,
}

impl Service {
    pub const ALL: [Service; 10] = [
        Service::Ssh,
        Service::Ftp,
        Service::Mysql,
        Service::Postgres,
        Service::Redis,
        Service::Telnet,
        Service::Pop3,
        Service::Imap,
        Service::Smtp,
        Service::HttpBasic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Ftp => "ftp",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::Redis => "redis",
            Self::Telnet => "telnet",
            Self::Pop3 => "pop3",
            Self::Imap => "imap",
            Self::Smtp => "smtp",
            Self::HttpBasic => "http-basic",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Ssh => 22,
            Self::Ftp => 21,
            Self::Mysql => 3306,
            Self::Postgres => 5432,
            Self::Redis => 6379,
            Self::Telnet => 23,
            Self::Pop3 => 110,
            Self::Imap => 143,
            Self::Smtp => 25,
            Self::HttpBasic => 80,
        }
    }

    /// Services that authenticate with a password only.
    pub fn uses_username(&self) -> bool {
        !matches!(self, Self::Redis)
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "ssh" => Ok(Self::Ssh),
            "ftp" => Ok(Self::Ftp),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "telnet" => Ok(Self::Telnet),
            "pop3" | "pop" => Ok(Self::Pop3),
            "imap" => Ok(Self::Imap),
            "smtp" => Ok(Self::Smtp),
            "http-basic" | "http" | "basic" => Ok(Self::HttpBasic),
            other => Err(EngineError::Config(format!("Unsupported protocol: {}", other))),
        }
    }
}

/// One authentication attempt against one service.
#[async_trait]
pub trait AuthAdapter: Send + Sync {
    /// `Ok(true)` when the credentials were accepted. Errors are transport
    /// failures and count as "not accepted".
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError>;
}

pub fn adapter_for(service: Service, http: &Client) -> Arc<dyn AuthAdapter> {
    match service {
        Service::Ssh => Arc::new(ssh::SshAdapter),
        Service::Ftp => Arc::new(ftp::FtpAdapter),
        Service::Mysql => Arc::new(mysql::MySqlAdapter),
        Service::Postgres => Arc::new(postgres::PostgresAdapter),
        Service::Redis => Arc::new(redis::RedisAdapter),
        Service::Telnet => Arc::new(telnet::TelnetAdapter),
        Service::Pop3 => Arc::new(mail::Pop3Adapter),
        Service::Imap => Arc::new(mail::ImapAdapter),
        Service::Smtp => Arc::new(mail::SmtpAdapter),
        Service::HttpBasic => Arc::new(http_basic::HttpBasicAdapter::new(http.clone())),
    }
}

/// Credential attempt probe with first-success-wins per target.
pub struct CredentialProbe {
    adapters: HashMap<Service, Arc<dyn AuthAdapter>>,
    solved: Arc<DashSet<CredentialTarget>>,
}

impl CredentialProbe {
    pub fn new(adapters: HashMap<Service, Arc<dyn AuthAdapter>>) -> Self {
        Self {
            adapters,
            solved: Arc::new(DashSet::new()),
        }
    }

    pub fn for_services(services: impl IntoIterator<Item = Service>, http: &Client) -> Self {
        Self::new(services.into_iter().map(|s| (s, adapter_for(s, http))).collect())
    }

    /// Targets that already yielded a valid credential.
    pub fn solved(&self) -> Arc<DashSet<CredentialTarget>> {
        self.solved.clone()
    }
}

#[async_trait]
impl Probe for CredentialProbe {
    type Item = CredentialItem;

    async fn probe(&self, item: CredentialItem, ctx: &ProbeContext) -> Option<ResultRecord> {
        if self.solved.contains(&item.target) {
            return None;
        }
        let adapter = self.adapters.get(&item.target.service)?;

        match adapter.attempt(&item.target, &item.username, &item.password, ctx.timeout).await {
            Ok(true) => {
                // Only the first success for a target is reported
                if !self.solved.insert(item.target.clone()) {
                    return None;
                }
                ctx.emitter.info(format!(
                    "Valid credential for {}: {} / {}",
                    item.target, item.username, item.password
                ));
                Some(ResultRecord::Credential {
                    host: item.target.host,
                    port: item.target.port,
                    service: item.target.service.to_string(),
                    username: item.username,
                    password: item.password,
                    success: true,
                    timestamp: Utc::now(),
                })
            }
            Ok(false) => None,
            Err(e) => {
                debug!(target = %item.target, error = %e, "Credential attempt failed");
                None
            }
        }
    }
}

/// Lazily enumerate target x users x passwords, target-major, skipping
/// targets that are already solved.
pub fn credential_items(
    targets: Vec<CredentialTarget>,
    users: Arc<[String]>,
    passwords: Arc<[String]>,
    solved: Arc<DashSet<CredentialTarget>>,
) -> impl Iterator<Item = CredentialItem> + Send + 'static {
    let passwordless: Arc<[String]> = Arc::from(vec![String::new()]);
    targets.into_iter().flat_map(move |target| {
        let users = if target.service.uses_username() {
            users.clone()
        } else {
            passwordless.clone()
        };
        let passwords = passwords.clone();
        let solved = solved.clone();
        (0..users.len()).flat_map(move |u| {
            let target = target.clone();
            let users = users.clone();
            let passwords = passwords.clone();
            let solved = solved.clone();
            let key = target.clone();
            (0..passwords.len())
                .take_while(move |_| !solved.contains(&key))
                .map(move |p| CredentialItem {
                    target: target.clone(),
                    username: users[u].clone(),
                    password: passwords[p].clone(),
                })
        })
    })
}

/// Number of attempts `credential_items` yields when nothing is solved.
pub fn attempt_count(targets: &[CredentialTarget], users: usize, passwords: usize) -> u64 {
    targets
        .iter()
        .map(|t| {
            let users = if t.service.uses_username() { users } else { 1 };
            users as u64 * passwords as u64
        })
        .sum()
}
