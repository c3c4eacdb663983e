pub mod interpreter;
pub mod script;
pub mod template;

pub use interpreter::{InterpreterLocator, SystemInterpreterLocator};
pub use template::Template;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use crate::errors::EngineError;
use crate::models::record::{PocMode, ResultRecord};
use crate::utils::truncation::{truncate_error, truncate_transcript};
use script::{run_script, ScriptExit};
use template::Variables;
use super::{Probe, ProbeContext};

#[derive(Debug, Clone)]
pub enum PocSource {
    Template(Arc<Template>),
    Script {
        content: String,
        interpreter: Option<PathBuf>,
    },
}

impl PocSource {
    pub fn mode(&self) -> PocMode {
        match self {
            PocSource::Template(_) => PocMode::Template,
            PocSource::Script { .. } => PocMode::Script,
        }
    }
}

/// One PoC execution against one target. Always yields a record unless the
/// job was cancelled; launch and transport failures land in `error`.
pub struct PocProbe {
    client: Client,
    source: PocSource,
    locator: Arc<dyn InterpreterLocator>,
    script_timeout: Duration,
    max_body: usize,
}

struct Execution {
    matched: Option<bool>,
    transcript: String,
    exit_code: Option<i32>,
    error: Option<String>,
}

impl PocProbe {
    pub fn new(
        client: Client,
        source: PocSource,
        locator: Arc<dyn InterpreterLocator>,
        script_timeout: Duration,
        max_body: usize,
    ) -> Self {
        Self { client, source, locator, script_timeout, max_body }
    }

    async fn run_template(&self, template: &Template, target: &str) -> Result<Execution, EngineError> {
        let vars = Variables::for_target(target)?;
        let run = template.execute(&self.client, &vars, self.max_body).await;
        Ok(Execution {
            matched: Some(run.matched),
            transcript: run.transcript,
            exit_code: None,
            error: run.error,
        })
    }

    async fn run_script(
        &self,
        content: &str,
        interpreter: Option<&std::path::Path>,
        target: &str,
        ctx: &ProbeContext,
    ) -> Result<Option<Execution>, EngineError> {
        let path = self.locator.locate(interpreter)?;
        ctx.emitter.info(format!("Running script with {}", path.display()));
        let run = run_script(&path, content, target, self.script_timeout, &ctx.cancel).await?;
        let (exit_code, error) = match run.exit {
            ScriptExit::Exited(code) => (code, None),
            ScriptExit::TimedOut => (
                None,
                Some(format!("Script killed after {}s timeout", self.script_timeout.as_secs())),
            ),
            ScriptExit::Cancelled => return Ok(None),
        };
        Ok(Some(Execution { matched: None, transcript: run.output, exit_code, error }))
    }
}

#[async_trait]
impl Probe for PocProbe {
    type Item = String;

    async fn probe(&self, target: String, ctx: &ProbeContext) -> Option<ResultRecord> {
        let started = Instant::now();
        let execution = match &self.source {
            PocSource::Template(template) => tokio::select! {
                result = self.run_template(template, &target) => Some(result),
                _ = ctx.cancel.cancelled() => None,
            },
            PocSource::Script { content, interpreter } => {
                self.run_script(content, interpreter.as_deref(), &target, ctx).await.transpose()
            }
        }?;

        let execution = execution.unwrap_or_else(|e| Execution {
            matched: None,
            transcript: String::new(),
            exit_code: None,
            error: Some(e.to_string()),
        });

        Some(ResultRecord::Poc {
            mode: self.source.mode(),
            target,
            matched: execution.matched,
            transcript: truncate_transcript(&execution.transcript),
            exit_code: execution.exit_code,
            error: execution.error.map(|e| truncate_error(&e)),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        })
    }
}
