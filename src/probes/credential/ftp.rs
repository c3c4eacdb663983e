use std::time::Duration;
use async_trait::async_trait;
use crate::errors::EngineError;
use crate::models::work::CredentialTarget;
use crate::probes::net::LineConn;
use super::AuthAdapter;

pub struct FtpAdapter;

#[async_trait]
impl AuthAdapter for FtpAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let mut conn = LineConn::open(&target.host, target.port, timeout).await?;

        let greeting = conn.read_reply().await?;
        if !greeting.starts_with("220") {
            return Err(EngineError::Probe(format!("unexpected FTP greeting: {}", greeting)));
        }

        conn.send_line(&format!("USER {}", username)).await?;
        let reply = conn.read_reply().await?;
        let accepted = if reply.starts_with("230") {
            true
        } else if reply.starts_with("331") || reply.starts_with("332") {
            conn.send_line(&format!("PASS {}", password)).await?;
            conn.read_reply().await?.starts_with("230")
        } else {
            false
        };

        let _ = conn.send_line("QUIT").await;
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::credential::Service;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    async fn fake_ftp(valid: (&'static str, &'static str)) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (read, mut write) = socket.into_split();
                    let mut lines = BufReader::new(read).lines();
                    write.write_all(b"220 test ftp\r\n").await.unwrap();
                    let mut user = String::new();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if let Some(u) = line.strip_prefix("USER ") {
                            user = u.to_string();
                            write.write_all(b"331 password please\r\n").await.unwrap();
                        } else if let Some(p) = line.strip_prefix("PASS ") {
                            let ok = user == valid.0 && p == valid.1;
                            let reply: &[u8] = if ok { b"230 welcome\r\n" } else { b"530 denied\r\n" };
                            write.write_all(reply).await.unwrap();
                        } else {
                            break;
                        }
                    }
                });
            }
        });
        port
    }

    #[tokio::test]
    async fn test_ftp_login() {
        let port = fake_ftp(("admin", "s3cret")).await;
        let target = CredentialTarget { host: "127.0.0.1".into(), port, service: Service::Ftp };
        let timeout = Duration::from_secs(1);
        assert!(FtpAdapter.attempt(&target, "admin", "s3cret", timeout).await.unwrap());
        assert!(!FtpAdapter.attempt(&target, "admin", "nope", timeout).await.unwrap());
    }
}
