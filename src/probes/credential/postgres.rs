use std::time::Duration;
use async_trait::async_trait;
use tokio_postgres::config::SslMode;
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;
use crate::errors::EngineError;
use crate::models::work::CredentialTarget;
use super::AuthAdapter;

/// PostgreSQL startup + password authentication against the `postgres`
/// database. A missing database still proves the login.
pub struct PostgresAdapter;

#[async_trait]
impl AuthAdapter for PostgresAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&target.host)
            .port(target.port)
            .user(username)
            .password(password)
            .dbname("postgres")
            .ssl_mode(SslMode::Disable)
            .connect_timeout(timeout);

        let connected = tokio::time::timeout(timeout, config.connect(NoTls))
            .await
            .map_err(|_| EngineError::Timeout(format!("PostgreSQL login to {}", target)))?;
        match connected {
            Ok((client, connection)) => {
                drop(client);
                drop(connection);
                Ok(true)
            }
            Err(e) => match e.code() {
                Some(code) if *code == SqlState::INVALID_CATALOG_NAME => Ok(true),
                Some(code)
                    if *code == SqlState::INVALID_PASSWORD
                        || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION =>
                {
                    Ok(false)
                }
                _ => Err(EngineError::Probe(format!("PostgreSQL: {}", e))),
            },
        }
    }
}
