use std::io::{BufRead, IsTerminal};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};
use crate::cli::commands::{AliveArgs, BruteArgs, Cli, DirsArgs, JsFindArgs, PocCommand, PortsArgs};
use crate::cli::progress::{render_outcome, JobProgress};
use crate::config::{parse_config, EngineConfig};
use crate::engine::Engine;
use crate::errors::EngineError;
use crate::events::EventPayload;
use crate::pipeline::config::{
    BruteForceConfig, DirScanConfig, JsMineConfig, LivenessConfig, PocConfig, PocSourceConfig, PortScanConfig,
};
use crate::pipeline::{JobCategory, JobConfig, JobOutcome, JobStatus};

/// Engine settings from `--config`, with `--db` layered on top.
pub async fn load_engine_config(cli: &Cli) -> Result<EngineConfig, EngineError> {
    let mut config = match &cli.config {
        Some(path) => parse_config(path).await?,
        None => EngineConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.storage.database = Some(db.clone());
    }
    Ok(config)
}

pub fn alive_config(args: AliveArgs) -> JobConfig {
    JobConfig::Liveness(LivenessConfig {
        target: args.target,
        concurrency: args.limits.threads,
        timeout_ms: args.limits.timeout,
        enable_icmp: !args.no_icmp,
        enable_tcp_ping: !args.no_tcp_ping,
        tcp_ping_ports: args.tcp_ports,
    })
}

pub fn ports_config(args: PortsArgs) -> JobConfig {
    JobConfig::PortScan(PortScanConfig {
        target: args.target,
        ports: args.ports,
        concurrency: args.limits.threads,
        timeout_ms: args.limits.timeout,
        alive_check: args.alive_check,
        enable_icmp: !args.no_icmp,
        fingerprint: !args.no_fingerprint,
        enable_udp: args.udp,
    })
}

pub fn dirs_config(args: DirsArgs) -> JobConfig {
    JobConfig::DirScan(DirScanConfig {
        target: args.target,
        extensions: args.extensions,
        concurrency: args.limits.threads,
        timeout_ms: args.limits.timeout,
        exclude_404: !args.keep_404,
        follow_redirects: args.follow_redirects,
        dictionary: args.dict,
        recursion_depth: args.depth,
    })
}

pub fn brute_config(args: BruteArgs) -> JobConfig {
    JobConfig::CredentialBruteForce(BruteForceConfig {
        targets: Vec::new(),
        target: Some(args.target),
        protocols: args.protocols,
        concurrency: args.limits.threads,
        timeout_ms: args.limits.timeout,
        user_dict: args.users,
        pass_dict: args.passwords,
    })
}

pub fn jsfind_config(args: JsFindArgs) -> JobConfig {
    JobConfig::JsMine(JsMineConfig {
        target: args.target,
        concurrency: args.limits.threads,
        timeout_ms: args.limits.timeout,
        deep_scan: args.deep,
        active_scan: args.active,
        danger_filter: !args.no_danger_filter,
    })
}

pub async fn poc_config(command: PocCommand) -> Result<JobConfig, EngineError> {
    let config = match command {
        PocCommand::Template { target, file, timeout } => PocConfig {
            target,
            source: PocSourceConfig::Template { content: read_source(&file).await? },
            timeout_ms: timeout,
            script_timeout_secs: None,
        },
        PocCommand::Script { target, file, interpreter, script_timeout } => PocConfig {
            target,
            source: PocSourceConfig::Script { content: read_source(&file).await?, interpreter },
            timeout_ms: None,
            script_timeout_secs: script_timeout,
        },
    };
    Ok(JobConfig::PocVerify(config))
}

async fn read_source(path: &Path) -> Result<String, EngineError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EngineError::Config(format!("Cannot read {}: {}", path.display(), e)))
}

/// Commands typed on an interactive terminal while a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    Stop,
}

fn parse_control(line: &str) -> Option<Control> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(Control::Pause),
        "r" | "resume" => Some(Control::Resume),
        "s" | "stop" | "q" => Some(Control::Stop),
        _ => None,
    }
}

/// Stdin is read on its own thread; a blocked read must not hold up
/// runtime shutdown.
fn spawn_control_reader() -> mpsc::UnboundedReceiver<Control> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if let Some(control) = parse_control(&line) {
                if tx.send(control).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

fn apply_control(engine: &Engine, category: JobCategory, control: Control) {
    match control {
        Control::Pause => {
            engine.controller.pause(category);
        }
        Control::Resume => {
            engine.controller.resume(category);
        }
        Control::Stop => {
            engine.controller.stop(category);
        }
    }
}

/// Start `job`, render its events until `complete` and stop it on Ctrl-C.
/// On a terminal, `p`, `r` and `s` lines pause, resume and stop the job.
pub async fn handle_job(engine_config: EngineConfig, job: JobConfig, json: bool, verbose: bool) -> Result<(), EngineError> {
    let engine = Engine::new(engine_config)?;
    let category = job.category();

    // Subscribe first; the bus does not replay
    let mut events = engine.bus.subscribe(category);
    let handle = engine.controller.start(job).await?;
    let job_id = handle.id();
    drop(handle);

    let mut progress = (!json).then(|| JobProgress::new(category.as_str(), verbose));
    let mut interactive = !json && std::io::stdin().is_terminal();
    let mut controls = if interactive {
        if let Some(progress) = progress.as_ref() {
            progress.println("Type p to pause, r to resume, s to stop (then Enter)");
        }
        spawn_control_reader()
    } else {
        mpsc::unbounded_channel().1
    };
    let mut interrupted = false;
    let mut outcome: Option<JobOutcome> = None;

    while outcome.is_none() {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                if event.job_id != job_id {
                    continue;
                }
                if json {
                    print_json(&event.payload)?;
                } else if let Some(progress) = progress.as_mut() {
                    progress.handle_event(&event);
                }
                if let EventPayload::Complete { outcome: done } = event.payload {
                    outcome = Some(done);
                }
            }
            control = controls.recv(), if interactive => match control {
                Some(control) => apply_control(&engine, category, control),
                None => interactive = false,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                warn!(category = %category, "Interrupted, stopping job");
                engine.controller.stop(category);
            }
        }
    }

    let outcome = match outcome {
        Some(outcome) => outcome,
        None => engine
            .controller
            .wait(category)
            .await
            .ok_or_else(|| EngineError::Internal("Job finished without an outcome".into()))?,
    };
    engine.shutdown().await;

    if json {
        eprintln!("{}", render_outcome(&outcome));
    }
    info!(job_id = %job_id, status = %outcome.status, findings = outcome.findings, "Done");
    match outcome.status {
        JobStatus::Failed => Err(EngineError::Execution(
            outcome.error.unwrap_or_else(|| "Job failed".to_string()),
        )),
        _ => Ok(()),
    }
}

fn print_json(payload: &EventPayload) -> Result<(), EngineError> {
    match payload {
        EventPayload::Result { record } => println!("{}", serde_json::to_string(record)?),
        EventPayload::Complete { outcome } => println!("{}", serde_json::to_string(outcome)?),
        _ => {}
    }
    Ok(())
}
