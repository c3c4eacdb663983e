use std::time::Duration;
use async_trait::async_trait;
use crate::errors::EngineError;
use crate::models::work::CredentialTarget;
use crate::probes::net::LineConn;
use super::AuthAdapter;

const FAILURE_MARKERS: &[&str] = &["incorrect", "fail", "denied", "invalid"];
const PROMPT_MARKERS: &[char] = &['$', '#', '>'];

/// Heuristic telnet login: answer the prompts and look for a shell prompt.
pub struct TelnetAdapter;

#[async_trait]
impl AuthAdapter for TelnetAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let mut conn = LineConn::open(&target.host, target.port, timeout).await?;

        // Banner and login prompt
        conn.read_chunk().await?;
        conn.send_line(username).await?;

        // Password prompt
        conn.read_chunk().await?;
        conn.send_line(password).await?;

        let reply = strip_negotiation(&conn.read_chunk().await?);
        Ok(looks_logged_in(&reply))
    }
}

/// Drop IAC option negotiation sequences.
fn strip_negotiation(raw: &str) -> String {
    raw.chars().filter(|c| *c != '\u{fffd}' && (!c.is_control() || c.is_whitespace())).collect()
}

fn looks_logged_in(reply: &str) -> bool {
    let lower = reply.to_ascii_lowercase();
    let trimmed = lower.trim_end();
    if FAILURE_MARKERS.iter().any(|m| lower.contains(m))
        || trimmed.ends_with("login:")
        || trimmed.ends_with("password:")
    {
        return false;
    }
    reply.contains(PROMPT_MARKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_detection() {
        assert!(looks_logged_in("Last login: today\r\nroot@box:~# "));
        assert!(looks_logged_in("user@host $ "));
        assert!(!looks_logged_in("Login incorrect\r\n\r\nlogin: "));
        assert!(!looks_logged_in("Access denied"));
        assert!(!looks_logged_in("Password: "));
    }
}
