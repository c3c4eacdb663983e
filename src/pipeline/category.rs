use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::errors::EngineError;

/// The kind of task a job runs. At most one job per category is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum JobCategory {
    Liveness,
    PortScan,
    DirScan,
    CredentialBruteForce,
    JsMine,
    PocVerify,
}

impl JobCategory {
    pub const ALL: [JobCategory; 6] = [
        JobCategory::Liveness,
        JobCategory::PortScan,
        JobCategory::DirScan,
        JobCategory::CredentialBruteForce,
        JobCategory::JsMine,
        JobCategory::PocVerify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Liveness => "liveness",
            Self::PortScan => "port-scan",
            Self::DirScan => "dir-scan",
            Self::CredentialBruteForce => "credential-brute-force",
            Self::JsMine => "js-mine",
            Self::PocVerify => "poc-verify",
        }
    }

    pub fn definition(&self) -> &'static CategoryDefinition {
        CATEGORIES
            .iter()
            .find(|d| d.category == *self)
            .unwrap_or(&CATEGORIES[0])
    }
}

impl std::fmt::Display for JobCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        CATEGORIES
            .iter()
            .find(|d| d.category.as_str() == normalized || d.aliases.contains(&normalized.as_str()))
            .map(|d| d.category)
            .ok_or_else(|| EngineError::Config(format!("Unknown job category: {}", s)))
    }
}

pub struct CategoryDefinition {
    pub category: JobCategory,
    pub display_name: &'static str,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
    pub default_concurrency: usize,
    pub default_timeout_ms: u64,
}

pub static CATEGORIES: &[CategoryDefinition] = &[
    CategoryDefinition {
        category: JobCategory::Liveness,
        display_name: "Host Liveness",
        description: "ICMP echo and TCP-connect sweep for live hosts",
        aliases: &["alive", "ping"],
        default_concurrency: 64,
        default_timeout_ms: 1_000,
    },
    CategoryDefinition {
        category: JobCategory::PortScan,
        display_name: "Port Scan",
        description: "TCP-connect port scan with optional banner and UDP probes",
        aliases: &["ports", "portscan"],
        default_concurrency: 200,
        default_timeout_ms: 1_000,
    },
    CategoryDefinition {
        category: JobCategory::DirScan,
        display_name: "Directory Scan",
        description: "Dictionary-driven HTTP path discovery with soft-404 suppression",
        aliases: &["dirs", "dirscan"],
        default_concurrency: 20,
        default_timeout_ms: 5_000,
    },
    CategoryDefinition {
        category: JobCategory::CredentialBruteForce,
        display_name: "Credential Brute Force",
        description: "Username/password matrix against network service logins",
        aliases: &["brute", "bruteforce", "weak-password"],
        default_concurrency: 10,
        default_timeout_ms: 3_000,
    },
    CategoryDefinition {
        category: JobCategory::JsMine,
        display_name: "JS Mining",
        description: "Script discovery with endpoint and secret extraction",
        aliases: &["jsfind", "jsfinder", "js"],
        default_concurrency: 10,
        default_timeout_ms: 10_000,
    },
    CategoryDefinition {
        category: JobCategory::PocVerify,
        display_name: "PoC Verification",
        description: "Single-shot template or script proof-of-concept execution",
        aliases: &["poc"],
        default_concurrency: 1,
        default_timeout_ms: 60_000,
    },
];
