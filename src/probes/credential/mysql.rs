use std::time::Duration;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use sqlx::{ConnectOptions, Connection};
use crate::errors::EngineError;
use crate::models::work::CredentialTarget;
use super::AuthAdapter;

/// SQLSTATE sent with "Access denied" (1045).
const ACCESS_DENIED: &str = "28000";

/// MySQL / MariaDB handshake with native or caching_sha2 password auth.
pub struct MySqlAdapter;

#[async_trait]
impl AuthAdapter for MySqlAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(username)
            .password(password)
            .ssl_mode(MySqlSslMode::Disabled);

        let connected = tokio::time::timeout(timeout, options.connect())
            .await
            .map_err(|_| EngineError::Timeout(format!("MySQL login to {}", target)))?;
        match connected {
            Ok(conn) => {
                let _ = conn.close().await;
                Ok(true)
            }
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(ACCESS_DENIED) => Ok(false),
            Err(e) => Err(EngineError::Probe(format!("MySQL: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::credential::Service;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_non_mysql_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"+PONG\r\n").await;
            }
        });

        let target = CredentialTarget { host: "127.0.0.1".into(), port, service: Service::Mysql };
        let result = MySqlAdapter.attempt(&target, "root", "root", Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}
