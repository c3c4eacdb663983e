use std::process::Stdio;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::select_ok;
use tokio::process::Command;
use tracing::debug;
use crate::errors::EngineError;
use crate::models::record::{AliveMethod, ResultRecord};
use super::{net, Probe, ProbeContext};

pub const DEFAULT_TCP_PING_PORTS: &[u16] = &[80, 443, 22, 445, 3389, 135, 139, 8080];

/// Host discovery by ICMP echo and/or TCP connect to a handful of ports.
pub struct LivenessProbe {
    pub enable_icmp: bool,
    pub enable_tcp: bool,
    pub tcp_ports: Vec<u16>,
}

#[async_trait]
impl Probe for LivenessProbe {
    type Item = String;

    async fn probe(&self, host: String, ctx: &ProbeContext) -> Option<ResultRecord> {
        if self.enable_icmp {
            let started = Instant::now();
            match icmp_echo(&host, ctx.timeout).await {
                Ok(true) => return Some(alive(host, AliveMethod::Icmp, started.elapsed())),
                Ok(false) => {}
                Err(e) => debug!(host = %host, error = %e, "ICMP probe unavailable"),
            }
        }

        if self.enable_tcp && !self.tcp_ports.is_empty() {
            let attempts = self.tcp_ports.iter().map(|&port| {
                let host = host.clone();
                Box::pin(async move {
                    net::connect(&host, port, ctx.timeout).await.map(|(_, rtt)| (port, rtt))
                })
            });
            if let Ok(((port, rtt), _)) = select_ok(attempts).await {
                return Some(alive(host, AliveMethod::Tcp { port }, rtt));
            }
        }
        None
    }
}

fn alive(host: String, method: AliveMethod, rtt: Duration) -> ResultRecord {
    ResultRecord::Alive {
        host,
        method,
        rtt_ms: rtt.as_millis() as u64,
        timestamp: Utc::now(),
    }
}

/// One echo request through the system `ping` binary.
pub async fn icmp_echo(host: &str, deadline: Duration) -> Result<bool, EngineError> {
    let mut cmd = Command::new("ping");
    cmd.args(ping_args(host, deadline))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    // ping's own wait granularity is coarse, so the outer deadline is authoritative
    match tokio::time::timeout(deadline + Duration::from_millis(250), child.wait()).await {
        Ok(status) => Ok(status?.success()),
        Err(_) => Ok(false),
    }
}

fn ping_args(host: &str, deadline: Duration) -> Vec<String> {
    let ms = deadline.as_millis().max(1);
    if cfg!(target_os = "windows") {
        vec!["-n".into(), "1".into(), "-w".into(), ms.to_string(), host.into()]
    } else if cfg!(target_os = "macos") {
        vec!["-c".into(), "1".into(), "-W".into(), ms.to_string(), host.into()]
    } else {
        let secs = ((ms + 999) / 1000).max(1);
        let mut args = vec!["-c".to_string(), "1".into(), "-W".into(), secs.to_string()];
        if host.contains(':') {
            args.insert(0, "-6".into());
        }
        args.push(host.into());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;
    use crate::pipeline::pause::PauseGate;
    use uuid::Uuid;
    use crate::events::{EventBus, JobEmitter};
    use crate::pipeline::category::JobCategory;

    fn ctx(timeout_ms: u64) -> ProbeContext {
        ProbeContext {
            cancel: CancellationToken::new(),
            pause: PauseGate::default(),
            emitter: JobEmitter::new(Arc::new(EventBus::new()), Uuid::new_v4(), JobCategory::Liveness),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn test_tcp_fallback_marks_host_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let probe = LivenessProbe { enable_icmp: false, enable_tcp: true, tcp_ports: vec![open] };
        match probe.probe("127.0.0.1".into(), &ctx(500)).await {
            Some(ResultRecord::Alive { method, .. }) => {
                assert_eq!(method, AliveMethod::Tcp { port: open })
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_absent() {
        let probe = LivenessProbe {
            enable_icmp: false,
            enable_tcp: true,
            tcp_ports: DEFAULT_TCP_PING_PORTS.to_vec(),
        };
        assert!(probe.probe("192.0.2.1".into(), &ctx(200)).await.is_none());
    }

    #[test]
    fn test_ping_args_contain_host() {
        let args = ping_args("10.0.0.1", Duration::from_millis(1500));
        assert_eq!(args.last().map(String::as_str), Some("10.0.0.1"));
        assert!(args.contains(&"1".to_string()));
    }
}
