use std::time::Duration;
use async_trait::async_trait;
use crate::errors::EngineError;
use crate::models::work::CredentialTarget;
use crate::probes::net::LineConn;
use super::AuthAdapter;

/// RESP `AUTH`. An instance that answers `PING` without authentication
/// counts as accepting any credential.
pub struct RedisAdapter;

#[async_trait]
impl AuthAdapter for RedisAdapter {
    async fn attempt(
        &self,
        target: &CredentialTarget,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool, EngineError> {
        let mut conn = LineConn::open(&target.host, target.port, timeout).await?;

        conn.write_raw(&encode_command(&["PING"])).await?;
        let pong = conn.read_line().await?;
        if pong.starts_with("+PONG") {
            return Ok(true);
        }

        let mut args = vec!["AUTH"];
        if !username.is_empty() && username != "default" {
            args.push(username);
        }
        args.push(password);
        conn.write_raw(&encode_command(&args)).await?;
        let reply = conn.read_line().await?;
        Ok(reply.starts_with("+OK"))
    }
}

pub fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}
