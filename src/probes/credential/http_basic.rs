use std::time::Duration;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use crate::errors::EngineError;
use crate::models::work::CredentialTarget;
use super::AuthAdapter;

/// HTTP basic authentication against the target's root URL.
pub struct HttpBasicAdapter {
    client: Client,
    /// Whether each URL challenges anonymous requests with 401.
    protected: DashMap<String, bool>,
}

impl HttpBasicAdapter {
    pub fn new(client: Client) -> Self {
        Self { client, protected: DashMap::new() }
    }

    async fn requires_auth(&self, url: &str, timeout: Duration) -> Result<bool, EngineError> {
        if let Some(known) = self.protected.get(url) {
            return Ok(*known);
        }
        let status = self.client.get(url).timeout(timeout).send().await?.status();
        let protected = status == StatusCode::UNAUTHORIZED;
        self.protected.insert(url.to_string(), protected);
        Ok(protected)
    }
}

pub fn target_url(target: &CredentialTarget) -> String {
    let scheme = if matches!(target.port, 443 | 8443) { "https" } else { "http" };
    if target.host.contains(':') {
        format!("{}://[{}]:{}/", scheme, target.host, target.port)
    } else {
        format!("{}://{}:{}/", scheme, target.host, target.port)
    }
}

#[async_trait]
impl AuthAdapter for HttpBasicAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let url = target_url(target);
        if !self.requires_auth(&url, timeout).await? {
            return Err(EngineError::Probe(format!("{} does not require basic auth", url)));
        }

        let status = self
            .client
            .get(&url)
            .basic_auth(username, Some(password))
            .timeout(timeout)
            .send()
            .await?
            .status();
        Ok(status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN && !status.is_server_error())
    }
}
