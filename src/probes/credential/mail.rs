use std::time::Duration;
use async_trait::async_trait;
use data_encoding::BASE64;
use crate::errors::EngineError;
use crate::models::work::CredentialTarget;
use crate::probes::net::LineConn;
use super::AuthAdapter;

pub struct Pop3Adapter;

#[async_trait]
impl AuthAdapter for Pop3Adapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let mut conn = LineConn::open(&target.host, target.port, timeout).await?;
        expect_prefix(&conn.read_line().await?, "+OK")?;

        if !conn.command(&format!("USER {}", username)).await?.starts_with("+OK") {
            return Ok(false);
        }
        let accepted = conn.command(&format!("PASS {}", password)).await?.starts_with("+OK");
        let _ = conn.send_line("QUIT").await;
        Ok(accepted)
    }
}

pub struct ImapAdapter;

#[async_trait]
impl AuthAdapter for ImapAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let mut conn = LineConn::open(&target.host, target.port, timeout).await?;
        expect_prefix(&conn.read_line().await?, "* OK")?;

        conn.send_line(&format!("a1 LOGIN {} {}", imap_quote(username), imap_quote(password)))
            .await?;
        // Skip untagged responses until the tagged completion
        let accepted = loop {
            let line = conn.read_line().await?;
            if let Some(rest) = line.strip_prefix("a1 ") {
                break rest.starts_with("OK");
            }
        };
        let _ = conn.send_line("a2 LOGOUT").await;
        Ok(accepted)
    }
}

pub struct SmtpAdapter;

#[async_trait]
impl AuthAdapter for SmtpAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let mut conn = LineConn::open(&target.host, target.port, timeout).await?;
        expect_prefix(&conn.read_reply().await?, "220")?;

        conn.send_line("EHLO jackal").await?;
        expect_prefix(&conn.read_reply().await?, "250")?;

        conn.send_line("AUTH LOGIN").await?;
        if !conn.read_reply().await?.starts_with("334") {
            return Err(EngineError::Probe("SMTP AUTH LOGIN not offered".into()));
        }
        conn.send_line(&BASE64.encode(username.as_bytes())).await?;
        if !conn.read_reply().await?.starts_with("334") {
            return Ok(false);
        }
        conn.send_line(&BASE64.encode(password.as_bytes())).await?;
        let accepted = conn.read_reply().await?.starts_with("235");
        let _ = conn.send_line("QUIT").await;
        Ok(accepted)
    }
}

fn expect_prefix(line: &str, prefix: &str) -> Result<(), EngineError> {
    if line.starts_with(prefix) {
        Ok(())
    } else {
        Err(EngineError::Probe(format!("unexpected greeting: {}", line)))
    }
}

fn imap_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::credential::Service;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Scripted line server: replies are chosen by a closure over each input line.
    async fn scripted(greeting: &'static str, respond: fn(&str) -> Option<String>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (read, mut write) = socket.into_split();
                    let mut lines = BufReader::new(read).lines();
                    write.write_all(greeting.as_bytes()).await.unwrap();
                    while let Ok(Some(line)) = lines.next_line().await {
                        match respond(&line) {
                            Some(reply) => write.write_all(reply.as_bytes()).await.unwrap(),
                            None => break,
                        }
                    }
                });
            }
        });
        port
    }

    fn target(port: u16, service: Service) -> CredentialTarget {
        CredentialTarget { host: "127.0.0.1".into(), port, service }
    }

    #[tokio::test]
    async fn test_pop3() {
        let port = scripted("+OK ready\r\n", |line| match line {
            "USER bob" => Some("+OK\r\n".into()),
            "PASS hunter2" => Some("+OK logged in\r\n".into()),
            l if l.starts_with("PASS") => Some("-ERR bad\r\n".into()),
            _ => None,
        })
        .await;
        let t = target(port, Service::Pop3);
        let d = Duration::from_secs(1);
        assert!(Pop3Adapter.attempt(&t, "bob", "hunter2", d).await.unwrap());
        assert!(!Pop3Adapter.attempt(&t, "bob", "wrong", d).await.unwrap());
    }

    #[tokio::test]
    async fn test_imap() {
        let port = scripted("* OK IMAP ready\r\n", |line| {
            if line == "a1 LOGIN \"bob\" \"pa\\\"ss\"" {
                Some("* CAPABILITY IMAP4rev1\r\na1 OK done\r\n".into())
            } else if line.starts_with("a1 LOGIN") {
                Some("a1 NO failed\r\n".into())
            } else {
                None
            }
        })
        .await;
        let t = target(port, Service::Imap);
        let d = Duration::from_secs(1);
        assert!(ImapAdapter.attempt(&t, "bob", "pa\"ss", d).await.unwrap());
        assert!(!ImapAdapter.attempt(&t, "bob", "x", d).await.unwrap());
    }

    #[tokio::test]
    async fn test_smtp_auth_login() {
        let port = scripted("220 mail ESMTP\r\n", |line| {
            let user = BASE64.encode(b"bob");
            let pass = BASE64.encode(b"pw");
            if line.starts_with("EHLO") {
                Some("250-mail\r\n250 AUTH LOGIN PLAIN\r\n".into())
            } else if line == "AUTH LOGIN" || line == user {
                Some("334 VXNlcm5hbWU6\r\n".into())
            } else if line == pass {
                Some("235 ok\r\n".into())
            } else if line == "QUIT" {
                None
            } else {
                Some("535 bad\r\n".into())
            }
        })
        .await;
        let t = target(port, Service::Smtp);
        let d = Duration::from_secs(1);
        assert!(SmtpAdapter.attempt(&t, "bob", "pw", d).await.unwrap());
        assert!(!SmtpAdapter.attempt(&t, "bob", "nope", d).await.unwrap());
    }

    #[test]
    fn test_imap_quote_escapes() {
        assert_eq!(imap_quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
