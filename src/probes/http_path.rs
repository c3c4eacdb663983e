use std::sync::{LazyLock, Mutex};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tracing::debug;
use crate::http::read_body_limited;
use crate::models::record::ResultRecord;
use crate::models::work::PathItem;
use crate::utils::truncation::truncate_chars;
use super::{Probe, ProbeContext};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));

const TITLE_MAX_CHARS: usize = 100;

/// Response shape of a path that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Soft404 {
    pub status: u16,
    pub size: u64,
}

/// GET probe for one (base URL, dictionary path) pair.
pub struct PathProbe {
    client: Client,
    exclude_404: bool,
    max_body: usize,
    max_depth: u32,
    baselines: DashMap<String, Soft404>,
    visited: DashSet<String>,
    next_level: Mutex<Vec<String>>,
}

impl PathProbe {
    pub fn new(client: Client, exclude_404: bool, max_body: usize, max_depth: u32) -> Self {
        Self {
            client,
            exclude_404,
            max_body,
            max_depth,
            baselines: DashMap::new(),
            visited: DashSet::new(),
            next_level: Mutex::new(Vec::new()),
        }
    }

    /// Mark a base URL as scanned. False if it was already known.
    pub fn mark_visited(&self, base: &str) -> bool {
        self.visited.insert(base.trim_end_matches('/').to_string())
    }

    /// Request a random path to learn what "not found" looks like on `base`.
    pub async fn learn_baseline(&self, base: &str) -> Option<Soft404> {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let url = format!("{}/{}", base.trim_end_matches('/'), token.to_lowercase());

        let response = self.client.get(&url).send().await.ok()?;
        let status = response.status().as_u16();
        let body = read_body_limited(response, self.max_body).await.ok()?;
        let baseline = Soft404 { status, size: body.len() as u64 };
        debug!(base, status, size = baseline.size, "Learned not-found baseline");
        self.baselines.insert(base.trim_end_matches('/').to_string(), baseline);
        Some(baseline)
    }

    /// Directories discovered since the last call, for the next recursion level.
    pub fn take_next_level(&self) -> Vec<String> {
        match self.next_level.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn is_not_found(&self, base: &str, status: u16, size: u64) -> bool {
        if !self.exclude_404 {
            return false;
        }
        if status == StatusCode::NOT_FOUND.as_u16() {
            return true;
        }
        self.baselines
            .get(base.trim_end_matches('/'))
            .map(|b| b.status == status && b.size == size)
            .unwrap_or(false)
    }

    fn queue_directory(&self, url: &str, status: u16, location: Option<&str>) {
        let is_dir = url.ends_with('/')
            || status == StatusCode::FORBIDDEN.as_u16()
            || location.map(|l| l.ends_with('/')).unwrap_or(false);
        if !is_dir {
            return;
        }

        let next = match location {
            Some(loc) => resolve_location(url, loc),
            None => url.to_string(),
        };
        let next = next.trim_end_matches('/').to_string();
        if self.visited.insert(next.clone()) {
            if let Ok(mut guard) = self.next_level.lock() {
                guard.push(next);
            }
        }
    }
}

#[async_trait]
impl Probe for PathProbe {
    type Item = PathItem;

    async fn probe(&self, item: PathItem, _ctx: &ProbeContext) -> Option<ResultRecord> {
        let url = item.url();
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %url, error = %e, "Request failed");
                return None;
            }
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let header = |name: reqwest::header::HeaderName| {
            headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
        };
        let content_type = header(reqwest::header::CONTENT_TYPE);
        let location = if (300..400).contains(&status) {
            header(reqwest::header::LOCATION)
        } else {
            None
        };

        let body = read_body_limited(response, self.max_body).await.ok()?;
        let size = body.len() as u64;
        if self.is_not_found(&item.base_url, status, size) {
            return None;
        }

        let title = content_type
            .as_deref()
            .filter(|ct| ct.to_ascii_lowercase().contains("html"))
            .and_then(|_| extract_title(&String::from_utf8_lossy(&body)));

        if item.depth < self.max_depth {
            self.queue_directory(&url, status, location.as_deref());
        }

        Some(ResultRecord::Path {
            url,
            status,
            size,
            title,
            content_type,
            location,
            timestamp: Utc::now(),
        })
    }
}

pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        None
    } else {
        Some(truncate_chars(&title, TITLE_MAX_CHARS))
    }
}

/// Resolve a `Location` header against the URL that produced it.
pub fn resolve_location(url: &str, location: &str) -> String {
    match reqwest::Url::parse(url).and_then(|base| base.join(location)) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!("{}/{}", url.trim_end_matches('/'), location.trim_start_matches('/')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><TITLE>\n  Admin   Panel </TITLE></html>").as_deref(),
            Some("Admin Panel")
        );
        assert_eq!(extract_title("<html><title></title></html>"), None);
        assert_eq!(extract_title("no markup"), None);
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(resolve_location("http://h/admin", "/admin/"), "http://h/admin/");
        assert_eq!(resolve_location("http://h/a/b", "c/"), "http://h/a/c/");
        assert_eq!(resolve_location("http://h/a", "https://other/x/"), "https://other/x/");
    }

    #[test]
    fn test_directory_detection_queues_once() {
        let probe = PathProbe::new(Client::new(), true, 1024, 2);
        probe.mark_visited("http://h");
        probe.queue_directory("http://h/admin", 403, None);
        probe.queue_directory("http://h/admin", 403, None);
        probe.queue_directory("http://h/img", 301, Some("/img/"));
        probe.queue_directory("http://h/file.txt", 200, None);
        assert_eq!(probe.take_next_level(), vec!["http://h/admin", "http://h/img"]);
        assert!(probe.take_next_level().is_empty());
    }

    #[test]
    fn test_soft_404_matching() {
        let probe = PathProbe::new(Client::new(), true, 1024, 0);
        probe.baselines.insert("http://h".into(), Soft404 { status: 200, size: 42 });
        assert!(probe.is_not_found("http://h/", 200, 42));
        assert!(probe.is_not_found("http://h", 404, 10));
        assert!(!probe.is_not_found("http://h", 200, 43));

        let keep_all = PathProbe::new(Client::new(), false, 1024, 0);
        assert!(!keep_all.is_not_found("http://h", 404, 0));
    }
}
