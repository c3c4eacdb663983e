use std::time::{Duration, Instant};
use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;
use crate::models::record::{ResultRecord, Transport};
use crate::models::work::PortItem;
use super::{net, service, Probe, ProbeContext};

const BANNER_MAX_CHARS: usize = 120;

/// TCP connect (and optional UDP) open-port probe.
pub struct PortProbe {
    pub fingerprint: bool,
}

#[async_trait]
impl Probe for PortProbe {
    type Item = PortItem;

    async fn probe(&self, item: PortItem, ctx: &ProbeContext) -> Option<ResultRecord> {
        match item.transport {
            Transport::Tcp => self.probe_tcp(item, ctx.timeout).await,
            Transport::Udp => probe_udp(item, ctx.timeout).await,
        }
    }
}

impl PortProbe {
    async fn probe_tcp(&self, item: PortItem, deadline: Duration) -> Option<ResultRecord> {
        let (mut stream, rtt) = match net::connect(&item.host, item.port, deadline).await {
            Ok(ok) => ok,
            Err(e) => {
                debug!(host = %item.host, port = item.port, error = %e, "Port closed or filtered");
                return None;
            }
        };

        let mut banner = None;
        let mut service_name = service::guess_by_port(item.port).to_string();
        if self.fingerprint {
            let read_window = deadline.min(Duration::from_millis(1500));
            let mut raw = net::read_some(&mut stream, read_window).await;
            if raw.is_empty() {
                if let Some(nudge) = service::nudge_for(item.port) {
                    if stream.write_all(nudge).await.is_ok() {
                        raw = net::read_some(&mut stream, read_window).await;
                    }
                }
            }
            service_name = service::refine(item.port, &raw);
            banner = service::clean_banner(&raw, BANNER_MAX_CHARS);
        }

        Some(ResultRecord::OpenPort {
            host: item.host,
            port: item.port,
            transport: Transport::Tcp,
            state: "open".to_string(),
            rtt_ms: rtt.as_millis() as u64,
            service: service_name,
            banner,
            timestamp: Utc::now(),
        })
    }
}

/// UDP probe: any reply to a protocol-appropriate payload means open.
async fn probe_udp(item: PortItem, deadline: Duration) -> Option<ResultRecord> {
    let bind = if item.host.contains(':') { "[::]:0" } else { "0.0.0.0:0" };
    let socket = UdpSocket::bind(bind).await.ok()?;
    socket.connect((item.host.as_str(), item.port)).await.ok()?;

    let started = Instant::now();
    socket.send(&udp_payload(item.port)).await.ok()?;

    let mut buffer = [0u8; 1024];
    match timeout(deadline, socket.recv(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => Some(ResultRecord::OpenPort {
            host: item.host,
            port: item.port,
            transport: Transport::Udp,
            state: "open".to_string(),
            rtt_ms: started.elapsed().as_millis() as u64,
            service: service::guess_by_port(item.port).to_string(),
            banner: None,
            timestamp: Utc::now(),
        }),
        _ => None,
    }
}

pub fn udp_payload(port: u16) -> Vec<u8> {
    match port {
        // DNS A query for example.com
        53 => vec![
            0x13, 0x37, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00,
            0x00, 0x01, 0x00, 0x01,
        ],
        // NTP v3 client request
        123 => {
            let mut packet = vec![0u8; 48];
            packet[0] = 0x1b;
            packet
        }
        // SNMPv1 GetRequest sysDescr.0, community "public"
        161 => vec![
            0x30, 0x26, 0x02, 0x01, 0x00, 0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c',
            0xa0, 0x19, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00,
            0x30, 0x0e, 0x30, 0x0c, 0x06, 0x08, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00,
            0x05, 0x00,
        ],
        _ => Vec::new(),
    }
}
