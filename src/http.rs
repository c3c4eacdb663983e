use std::time::Duration;
use reqwest::{Client, Response};
use crate::config::HttpConfig;
use crate::errors::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    None,
    Follow,
}

/// Build the HTTP client used by web probes.
pub fn build_client(config: &HttpConfig, timeout: Duration, redirects: Redirects) -> Result<Client, EngineError> {
    let policy = match redirects {
        Redirects::None => reqwest::redirect::Policy::none(),
        Redirects::Follow => reqwest::redirect::Policy::limited(10),
    };

    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .redirect(policy)
        .user_agent(config.user_agent.clone())
        .pool_max_idle_per_host(8)
        .tcp_nodelay(true)
        .build()
        .map_err(|e| EngineError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Read a response body, stopping after `limit` bytes.
pub async fn read_body_limited(mut response: Response, limit: usize) -> Result<Vec<u8>, EngineError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(body.len());
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Prefix a bare host with `http://` and check it is an http(s) URL.
/// The path is kept as given.
pub fn parse_target_url(raw: &str) -> Result<reqwest::Url, EngineError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EngineError::Config("Target URL is empty".into()));
    }
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    let url = reqwest::Url::parse(&with_scheme).map_err(|_| EngineError::parse(raw))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(EngineError::parse(raw));
    }
    Ok(url)
}

/// Prefix a bare host with `http://` and strip trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String, EngineError> {
    let url = parse_target_url(raw)?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}
