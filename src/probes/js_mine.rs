use std::sync::{LazyLock, Mutex};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashSet;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;
use crate::http::read_body_limited;
use crate::models::record::{ResultRecord, SecretHit};
use crate::models::work::CrawlItem;
use super::secrets::scan_secrets;
use super::{Probe, ProbeContext};

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](((?:/|\.\./)[a-zA-Z0-9_./\-]+)|(https?://[a-zA-Z0-9_./\-]+))["']"#)
        .expect("valid path regex")
});
static SCRIPT_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script[^>]+src\s*=\s*["']([^"']+)["']"#).expect("valid script regex")
});
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a[^>]+href\s*=\s*["']([^"'#]+)["']"#).expect("valid href regex")
});

const STATIC_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".css", ".ico", ".woff", ".woff2", ".ttf",
];
const DANGER_MARKERS: &[&str] = &["del", "remove", "logout", "exit"];

/// Raw extraction from one document, before per-job dedup.
#[derive(Debug, Default, PartialEq)]
pub struct Extraction {
    pub endpoints: Vec<String>,
    /// Absolute script URLs.
    pub scripts: Vec<String>,
    /// Absolute same-origin page links.
    pub links: Vec<String>,
    pub secrets: Vec<SecretHit>,
}

pub fn is_valid_endpoint(candidate: &str) -> bool {
    let lower = candidate.to_ascii_lowercase();
    if STATIC_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }
    if candidate.len() < 2 || candidate.len() > 200 {
        return false;
    }
    candidate.contains('/') || lower.ends_with(".js")
}

pub fn is_dangerous(endpoint: &str) -> bool {
    let lower = endpoint.to_ascii_lowercase();
    DANGER_MARKERS.iter().any(|m| lower.contains(m))
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Pull endpoints, script URLs, page links and secrets out of `content`,
/// resolving relative references against `source`.
pub fn analyze(content: &str, source: &Url) -> Extraction {
    let mut out = Extraction::default();

    for caps in PATH_RE.captures_iter(content) {
        let Some(raw) = caps.get(1).map(|m| m.as_str()) else { continue };
        if !is_valid_endpoint(raw) {
            continue;
        }
        if raw.to_ascii_lowercase().ends_with(".js") {
            if let Ok(resolved) = source.join(raw) {
                out.scripts.push(resolved.to_string());
            }
        } else {
            out.endpoints.push(raw.to_string());
        }
    }

    for caps in SCRIPT_SRC_RE.captures_iter(content) {
        if let Ok(resolved) = source.join(&caps[1]) {
            if matches!(resolved.scheme(), "http" | "https") {
                out.scripts.push(resolved.to_string());
            }
        }
    }

    for caps in HREF_RE.captures_iter(content) {
        let Ok(resolved) = source.join(&caps[1]) else { continue };
        let path = resolved.path().to_ascii_lowercase();
        if same_origin(source, &resolved)
            && !path.ends_with(".js")
            && !STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        {
            let mut link = resolved;
            link.set_fragment(None);
            out.links.push(link.to_string());
        }
    }

    out.secrets = scan_secrets(content);
    out
}

/// Fetches pages and scripts, reporting only findings not yet seen by the job.
pub struct JsMineProbe {
    client: Client,
    seed: Url,
    max_body: usize,
    deep_scan: bool,
    visited: DashSet<String>,
    seen: DashSet<String>,
    endpoints: Mutex<Vec<String>>,
    next_level: Mutex<Vec<CrawlItem>>,
}

impl JsMineProbe {
    pub fn new(client: Client, seed: Url, max_body: usize, deep_scan: bool) -> Self {
        let visited = DashSet::new();
        visited.insert(seed.to_string());
        Self {
            client,
            seed,
            max_body,
            deep_scan,
            visited,
            seen: DashSet::new(),
            endpoints: Mutex::new(Vec::new()),
            next_level: Mutex::new(Vec::new()),
        }
    }

    pub fn max_depth(&self) -> u32 {
        if self.deep_scan { 2 } else { 1 }
    }

    pub fn take_next_level(&self) -> Vec<CrawlItem> {
        match self.next_level.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Every endpoint reported so far, resolved to an absolute URL on the
    /// seed's origin. Used for the active verification pass.
    pub fn verification_targets(&self, danger_filter: bool) -> Vec<String> {
        let endpoints = match self.endpoints.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        endpoints
            .iter()
            .filter(|ep| !(danger_filter && is_dangerous(ep)))
            .filter_map(|ep| self.seed.join(ep).ok())
            .filter(|url| same_origin(&self.seed, url))
            .map(|url| url.to_string())
            .collect()
    }

    fn enqueue(&self, url: &str, depth: u32) {
        if self.visited.insert(url.to_string()) {
            if let Ok(mut guard) = self.next_level.lock() {
                guard.push(CrawlItem { url: url.to_string(), depth });
            }
        }
    }

    fn first_sighting(&self, key: String) -> bool {
        self.seen.insert(key)
    }
}

#[async_trait]
impl Probe for JsMineProbe {
    type Item = CrawlItem;

    async fn probe(&self, item: CrawlItem, _ctx: &ProbeContext) -> Option<ResultRecord> {
        let requested = Url::parse(&item.url).ok()?;
        let response = match self.client.get(requested).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %item.url, error = %e, "Fetch failed");
                return None;
            }
        };
        // Relative references resolve against where redirects landed
        let source = response.url().clone();
        let body = read_body_limited(response, self.max_body).await.ok()?;
        let content = String::from_utf8_lossy(&body);
        let found = analyze(&content, &source);

        if item.depth < self.max_depth() {
            for script in &found.scripts {
                self.enqueue(script, item.depth + 1);
            }
        }
        // Page links are followed one hop from the seed only
        if self.deep_scan && item.depth == 0 {
            for link in &found.links {
                self.enqueue(link, item.depth + 1);
            }
        }

        let endpoints: Vec<String> = found
            .endpoints
            .into_iter()
            .filter(|e| self.first_sighting(format!("endpoint:{}", e)))
            .collect();
        let scripts: Vec<String> = found
            .scripts
            .into_iter()
            .filter(|s| self.first_sighting(format!("script:{}", s)))
            .collect();
        let secrets: Vec<SecretHit> = found
            .secrets
            .into_iter()
            .filter(|h| self.first_sighting(format!("secret:{}:{}", h.rule, h.value)))
            .collect();

        if endpoints.is_empty() && scripts.is_empty() && secrets.is_empty() {
            return None;
        }
        if let Ok(mut guard) = self.endpoints.lock() {
            guard.extend(endpoints.iter().cloned());
        }

        Some(ResultRecord::JsAsset {
            source: item.url,
            endpoints,
            scripts,
            secrets,
            timestamp: Utc::now(),
        })
    }
}

/// Active verification of a mined endpoint: HEAD, then GET when HEAD is
/// refused with 405.
pub struct EndpointProbe {
    client: Client,
}

impl EndpointProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn interesting(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 401 | 403 | 500)
}

#[async_trait]
impl Probe for EndpointProbe {
    type Item = String;

    async fn probe(&self, url: String, _ctx: &ProbeContext) -> Option<ResultRecord> {
        let mut status = self.client.head(&url).send().await.ok()?.status();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            status = self.client.get(&url).send().await.ok()?.status();
        }
        if !interesting(status) {
            return None;
        }
        Some(ResultRecord::VerifiedEndpoint {
            url,
            status: status.as_u16(),
            timestamp: Utc::now(),
        })
    }
}
