use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use dashmap::DashSet;
use reqwest::Url;
use tracing::info;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::http::{build_client, Redirects};
use crate::models::record::{ResultRecord, Transport};
use crate::models::work::{CrawlItem, CredentialTarget, PathItem, PortItem};
use crate::probes::credential::{attempt_count, credential_items, CredentialProbe};
use crate::probes::http_path::PathProbe;
use crate::probes::js_mine::{EndpointProbe, JsMineProbe};
use crate::probes::liveness::{LivenessProbe, DEFAULT_TCP_PING_PORTS};
use crate::probes::poc::{InterpreterLocator, PocProbe, PocSource};
use crate::probes::port::PortProbe;
use crate::probes::{Probe, ProbeContext};
use crate::targets::ports::UDP_PORTS;
use crate::targets::{PortSet, TargetSet};
use super::config::{JobPlan, ValidatedJob};
use super::metrics::JobCounters;
use super::pool::WorkerPool;

/// Shared collaborators a pipeline may need.
#[derive(Clone)]
pub struct RunEnv {
    pub engine: Arc<EngineConfig>,
    pub locator: Arc<dyn InterpreterLocator>,
}

/// Drives one validated job to completion. Findings and progress go out
/// through the context's emitter; the caller publishes the terminal event.
pub struct JobRunner {
    job: ValidatedJob,
    env: RunEnv,
    ctx: ProbeContext,
    counters: Arc<JobCounters>,
}

/// Deadline for a whole work item, given how many network waits the probe
/// may chain.
fn item_deadline(timeout: Duration, waits: u32) -> Duration {
    timeout * waits + Duration::from_millis(500)
}

impl JobRunner {
    pub fn new(job: ValidatedJob, env: RunEnv, ctx: ProbeContext, counters: Arc<JobCounters>) -> Self {
        Self { job, env, ctx, counters }
    }

    fn pool(&self, waits: u32) -> WorkerPool {
        WorkerPool::new(self.job.concurrency, item_deadline(self.job.timeout, waits), self.counters.clone())
    }

    fn max_body(&self) -> usize {
        self.env.engine.http.max_body_bytes
    }

    pub async fn run(self) -> Result<(), EngineError> {
        info!(
            job_id = %self.ctx.emitter.job_id(),
            category = %self.job.category,
            target = %self.job.target,
            concurrency = self.job.concurrency,
            timeout_ms = self.job.timeout.as_millis() as u64,
            "Pipeline started"
        );
        match self.job.plan.clone() {
            JobPlan::Liveness { targets, enable_icmp, enable_tcp_ping, tcp_ping_ports } => {
                let probe = Arc::new(LivenessProbe {
                    enable_icmp,
                    enable_tcp: enable_tcp_ping,
                    tcp_ports: tcp_ping_ports,
                });
                self.ctx.emitter.info(format!("Sweeping up to {} hosts", targets.count()));
                self.pool(2).run(targets.iter(), probe, &self.ctx, Some(targets.count())).await?;
            }
            JobPlan::PortScan { targets, ports, alive_check, enable_icmp, fingerprint, enable_udp } => {
                self.run_port_scan(targets, ports, alive_check, enable_icmp, fingerprint, enable_udp).await?;
            }
            JobPlan::DirScan { bases, paths, exclude_404, follow_redirects, recursion_depth } => {
                self.run_dir_scan(bases, paths, exclude_404, follow_redirects, recursion_depth).await?;
            }
            JobPlan::CredentialBruteForce { targets, users, passwords } => {
                self.run_brute_force(targets, users, passwords).await?;
            }
            JobPlan::JsMine { seed, deep_scan, active_scan, danger_filter } => {
                self.run_js_mine(seed, deep_scan, active_scan, danger_filter).await?;
            }
            JobPlan::PocVerify { target, source, script_timeout } => {
                self.run_poc(target, source, script_timeout).await?;
            }
        }
        Ok(())
    }

    async fn run_port_scan(
        &self,
        targets: TargetSet,
        ports: PortSet,
        alive_check: bool,
        enable_icmp: bool,
        fingerprint: bool,
        enable_udp: bool,
    ) -> Result<(), EngineError> {
        let (hosts, host_count): (Box<dyn Iterator<Item = String> + Send>, u64) = if alive_check {
            let alive = self.sweep_alive(&targets, enable_icmp).await?;
            self.ctx.emitter.info(format!("{} of {} hosts alive", alive.len(), targets.count()));
            let count = alive.len() as u64;
            (Box::new(alive.into_iter()), count)
        } else {
            (Box::new(targets.iter()), targets.count())
        };
        if self.ctx.cancel.is_cancelled() {
            return Ok(());
        }

        let tcp: Arc<[u16]> = ports.as_slice().into();
        let udp: Arc<[u16]> = if enable_udp { Arc::from(UDP_PORTS) } else { Arc::from(Vec::new()) };
        let total = host_count * (tcp.len() + udp.len()) as u64;
        self.ctx.emitter.info(format!(
            "Scanning {} ports on {} hosts{}",
            tcp.len(),
            host_count,
            if enable_udp { " (+UDP)" } else { "" }
        ));

        let items = hosts.flat_map(move |host| {
            let tcp = tcp.clone();
            let udp = udp.clone();
            let udp_host = host.clone();
            (0..tcp.len())
                .map(move |i| PortItem { host: host.clone(), port: tcp[i], transport: Transport::Tcp })
                .chain((0..udp.len()).map(move |i| PortItem {
                    host: udp_host.clone(),
                    port: udp[i],
                    transport: Transport::Udp,
                }))
        });

        let probe = Arc::new(PortProbe { fingerprint });
        self.pool(3).run(items, probe, &self.ctx, Some(total)).await?;
        Ok(())
    }

    /// Liveness pre-sweep for port scans. Hosts keep their expression order.
    async fn sweep_alive(&self, targets: &TargetSet, enable_icmp: bool) -> Result<Vec<String>, EngineError> {
        let collector = Arc::new(AliveCollector {
            inner: LivenessProbe {
                enable_icmp,
                enable_tcp: true,
                tcp_ports: DEFAULT_TCP_PING_PORTS.to_vec(),
            },
            alive: DashSet::new(),
        });
        self.ctx.emitter.info(format!("Checking liveness of {} hosts", targets.count()));
        let sweep = WorkerPool::new(
            self.job.concurrency,
            item_deadline(self.job.timeout, 2),
            Arc::new(JobCounters::default()),
        )
        .quiet();
        sweep.run(targets.iter(), collector.clone(), &self.ctx, None).await?;
        Ok(targets.iter().filter(|h| collector.alive.contains(h)).collect())
    }

    async fn run_dir_scan(
        &self,
        bases: Vec<String>,
        paths: Arc<[String]>,
        exclude_404: bool,
        follow_redirects: bool,
        recursion_depth: u32,
    ) -> Result<(), EngineError> {
        let redirects = if follow_redirects { Redirects::Follow } else { Redirects::None };
        let client = build_client(&self.env.engine.http, self.job.timeout, redirects)?;
        let probe = Arc::new(PathProbe::new(client, exclude_404, self.max_body(), recursion_depth));
        let pool = self.pool(2);

        let mut level: Vec<String> = bases.into_iter().filter(|b| probe.mark_visited(b)).collect();
        for depth in 0..=recursion_depth {
            self.ctx.pause.wait(&self.ctx.cancel).await;
            if level.is_empty() || self.ctx.cancel.is_cancelled() {
                break;
            }
            if depth > 0 {
                self.ctx.emitter.info(format!("Recursion level {}: {} directories", depth, level.len()));
            }
            if exclude_404 {
                for base in &level {
                    tokio::select! {
                        _ = probe.learn_baseline(base) => {}
                        _ = self.ctx.cancel.cancelled() => return Ok(()),
                    }
                }
            }

            let total = (level.len() * paths.len()) as u64;
            let paths = paths.clone();
            let items = level.clone().into_iter().flat_map(move |base| {
                let paths = paths.clone();
                (0..paths.len()).map(move |i| PathItem {
                    base_url: base.clone(),
                    path: paths[i].clone(),
                    depth,
                })
            });
            pool.run(items, probe.clone(), &self.ctx, Some(total)).await?;
            level = probe.take_next_level();
        }
        Ok(())
    }

    async fn run_brute_force(
        &self,
        targets: Vec<CredentialTarget>,
        users: Arc<[String]>,
        passwords: Arc<[String]>,
    ) -> Result<(), EngineError> {
        let client = build_client(&self.env.engine.http, self.job.timeout, Redirects::None)?;
        let services: std::collections::HashSet<_> = targets.iter().map(|t| t.service).collect();
        let probe = Arc::new(CredentialProbe::for_services(services, &client));
        let total = attempt_count(&targets, users.len(), passwords.len());
        self.ctx.emitter.info(format!(
            "Trying {} users x {} passwords against {} targets",
            users.len(),
            passwords.len(),
            targets.len()
        ));
        let items = credential_items(targets, users, passwords, probe.solved());
        self.pool(6).run(items, probe, &self.ctx, Some(total)).await?;
        Ok(())
    }

    async fn run_js_mine(
        &self,
        seed: Url,
        deep_scan: bool,
        active_scan: bool,
        danger_filter: bool,
    ) -> Result<(), EngineError> {
        let client = build_client(&self.env.engine.http, self.job.timeout, Redirects::Follow)?;
        let probe = Arc::new(JsMineProbe::new(client, seed.clone(), self.max_body(), deep_scan));
        let pool = self.pool(2);

        let mut level = vec![CrawlItem { url: seed.to_string(), depth: 0 }];
        while !level.is_empty() && !self.ctx.cancel.is_cancelled() {
            self.ctx.pause.wait(&self.ctx.cancel).await;
            let depth = level[0].depth;
            if depth > 0 {
                self.ctx.emitter.info(format!("Processing script level {} ({} URLs)", depth, level.len()));
            }
            let total = level.len() as u64;
            pool.run(level.into_iter(), probe.clone(), &self.ctx, Some(total)).await?;
            level = probe.take_next_level();
        }

        if active_scan && !self.ctx.cancel.is_cancelled() {
            let targets = probe.verification_targets(danger_filter);
            self.ctx.emitter.info(format!("Verifying {} endpoints", targets.len()));
            let verifier = Arc::new(EndpointProbe::new(build_client(
                &self.env.engine.http,
                self.job.timeout,
                Redirects::None,
            )?));
            let total = targets.len() as u64;
            pool.run(targets.into_iter(), verifier, &self.ctx, Some(total)).await?;
        }
        Ok(())
    }

    async fn run_poc(&self, target: String, source: PocSource, script_timeout: Duration) -> Result<(), EngineError> {
        let client = build_client(&self.env.engine.http, self.job.timeout, Redirects::None)?;
        let probe = PocProbe::new(client, source, self.env.locator.clone(), script_timeout, self.max_body());
        self.ctx.pause.wait(&self.ctx.cancel).await;
        if self.ctx.cancel.is_cancelled() {
            return Ok(());
        }

        self.counters.add_dispatched(1);
        let record = probe.probe(target, &self.ctx).await;
        self.counters.add_completed(1);
        if let Some(record) = record {
            if !self.ctx.cancel.is_cancelled() {
                self.counters.add_findings(1);
                self.ctx.emitter.result(record);
            }
        }
        Ok(())
    }
}

/// Runs the liveness probe but keeps answers to itself.
struct AliveCollector {
    inner: LivenessProbe,
    alive: DashSet<String>,
}

#[async_trait]
impl Probe for AliveCollector {
    type Item = String;

    async fn probe(&self, host: String, ctx: &ProbeContext) -> Option<ResultRecord> {
        if self.inner.probe(host.clone(), ctx).await.is_some() {
            self.alive.insert(host);
        }
        None
    }
}
