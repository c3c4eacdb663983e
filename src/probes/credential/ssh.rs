use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use async_trait::async_trait;
use tracing::debug;
use crate::errors::EngineError;
use crate::models::work::CredentialTarget;
use super::AuthAdapter;

/// SSH password authentication. libssh2 is blocking, so each attempt runs
/// on the blocking pool bounded by the attempt timeout.
pub struct SshAdapter;

#[async_trait]
impl AuthAdapter for SshAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let host = target.host.clone();
        let port = target.port;
        let username = username.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || try_password(&host, port, &username, &password, timeout))
            .await
            .map_err(|e| EngineError::Internal(format!("SSH attempt task failed: {}", e)))?
    }
}

fn ssh_error(e: ssh2::Error) -> EngineError {
    EngineError::Probe(format!("SSH: {}", e))
}

fn try_password(host: &str, port: u16, username: &str, password: &str, timeout: Duration) -> Result<bool, EngineError> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| EngineError::Probe(format!("Cannot resolve {}", host)))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)?;
    tcp.set_read_timeout(Some(timeout))?;
    tcp.set_write_timeout(Some(timeout))?;

    let mut session = ssh2::Session::new().map_err(ssh_error)?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    session.handshake().map_err(ssh_error)?;

    match session.userauth_password(username, password) {
        Ok(()) => Ok(session.authenticated()),
        Err(e) => {
            debug!(host, port, username, error = %e, "SSH password rejected");
            Ok(false)
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
    async fn test_non_ssh_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"220 not an ssh server\r\n").await;
            }
        });

        let target = CredentialTarget { host: "127.0.0.1".into(), port, service: Service::Ssh };
        let result = SshAdapter.attempt(&target, "root", "toor", Duration::from_millis(500)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_closed_port_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let target = CredentialTarget { host: "127.0.0.1".into(), port, service: Service::Ssh };
        let result = SshAdapter.attempt(&target, "root", "toor", Duration::from_millis(500)).await;
        assert!(matches!(result, Err(EngineError::Io(_))));
    }
}
