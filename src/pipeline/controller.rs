use std::sync::Arc;
use std::time::Instant;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::events::{EventBus, EventSink, JobEmitter, LogLevel};
use crate::probes::poc::InterpreterLocator;
use crate::probes::ProbeContext;
use crate::targets::DictionarySource;
use super::category::JobCategory;
use super::config::JobConfig;
use super::metrics::{compute_outcome, JobCounters};
use super::pause::PauseGate;
use super::runner::{JobRunner, RunEnv};
use super::state::{JobOutcome, JobSnapshot, JobStatus};

#[derive(Debug, Clone)]
struct JobState {
    status: JobStatus,
    outcome: Option<JobOutcome>,
    finished_at: Option<DateTime<Utc>>,
}

/// Runtime handle of an accepted job.
pub struct JobHandle {
    id: Uuid,
    category: JobCategory,
    target: String,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    pause: PauseGate,
    counters: Arc<JobCounters>,
    emitter: JobEmitter,
    state: watch::Sender<JobState>,
}

impl JobHandle {
    fn new(sink: Arc<dyn EventSink>, category: JobCategory, target: String) -> Self {
        let id = Uuid::new_v4();
        let (state, _) = watch::channel(JobState {
            status: JobStatus::Running,
            outcome: None,
            finished_at: None,
        });
        Self {
            id,
            category,
            target,
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
            pause: PauseGate::default(),
            counters: Arc::new(JobCounters::default()),
            emitter: JobEmitter::new(sink, id, category),
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn category(&self) -> JobCategory {
        self.category
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn status(&self) -> JobStatus {
        self.live_status(self.state.borrow().status)
    }

    fn live_status(&self, status: JobStatus) -> JobStatus {
        match status {
            JobStatus::Running if self.pause.is_paused() => JobStatus::Paused,
            other => other,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        self.state.borrow().outcome.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.state.borrow().clone();
        let stats = self.counters.stats();
        JobSnapshot {
            id: self.id,
            category: self.category,
            status: self.live_status(state.status),
            target: self.target.clone(),
            dispatched: stats.dispatched,
            completed: stats.completed,
            findings: stats.findings,
            started_at: self.started_at,
            finished_at: state.finished_at,
        }
    }

    /// Wait for the terminal outcome.
    pub async fn wait(&self) -> JobOutcome {
        let mut rx = self.state.subscribe();
        loop {
            let current = rx.borrow_and_update().outcome.clone();
            if let Some(outcome) = current {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return compute_outcome(
                    JobStatus::Failed,
                    self.counters.stats(),
                    0,
                    Some("Job state dropped".into()),
                );
            }
        }
    }

    fn finish(&self, outcome: JobOutcome) {
        self.state.send_replace(JobState {
            status: outcome.status,
            outcome: Some(outcome),
            finished_at: Some(Utc::now()),
        });
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("target", &self.target)
            .field("status", &self.status())
            .finish()
    }
}

/// Owns the per-category job slots.
///
/// At most one job per category runs at a time. A job's slot is released
/// before its `complete` event is published, so a subscriber reacting to
/// that event can start the next job immediately.
pub struct JobController {
    bus: Arc<EventBus>,
    engine: Arc<EngineConfig>,
    dictionaries: Arc<dyn DictionarySource>,
    locator: Arc<dyn InterpreterLocator>,
    slots: Arc<DashMap<JobCategory, Arc<JobHandle>>>,
    last: Arc<DashMap<JobCategory, Arc<JobHandle>>>,
}

impl JobController {
    pub fn new(
        engine: Arc<EngineConfig>,
        bus: Arc<EventBus>,
        dictionaries: Arc<dyn DictionarySource>,
        locator: Arc<dyn InterpreterLocator>,
    ) -> Self {
        Self {
            bus,
            engine,
            dictionaries,
            locator,
            slots: Arc::new(DashMap::new()),
            last: Arc::new(DashMap::new()),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn engine_config(&self) -> &Arc<EngineConfig> {
        &self.engine
    }

    pub fn dictionaries(&self) -> &Arc<dyn DictionarySource> {
        &self.dictionaries
    }

    /// Validate `config`, claim its category slot and spawn the pipeline.
    /// Returns as soon as the job is running.
    pub async fn start(&self, config: JobConfig) -> Result<Arc<JobHandle>, EngineError> {
        let category = config.category();
        if self.slots.contains_key(&category) {
            return Err(EngineError::AlreadyRunning(category));
        }
        let job = config.validate(&self.engine, self.dictionaries.as_ref()).await?;

        let sink: Arc<dyn EventSink> = self.bus.clone();
        let handle = Arc::new(JobHandle::new(sink, category, job.target.clone()));
        match self.slots.entry(category) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyRunning(category)),
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
            }
        }
        self.last.insert(category, handle.clone());

        info!(job_id = %handle.id, category = %category, target = %handle.target, "Job started");
        handle.emitter.info(format!("Job started against {}", handle.target));

        let ctx = ProbeContext {
            cancel: handle.cancel.clone(),
            pause: handle.pause.clone(),
            emitter: handle.emitter.clone(),
            timeout: job.timeout,
        };
        let env = RunEnv {
            engine: self.engine.clone(),
            locator: self.locator.clone(),
        };
        let runner = JobRunner::new(job, env, ctx, handle.counters.clone());
        tokio::spawn(supervise(runner, handle.clone(), self.slots.clone()));

        Ok(handle)
    }

    /// Request cancellation. A category with no running job is a no-op.
    pub fn stop(&self, category: JobCategory) -> bool {
        let Some(handle) = self.slots.get(&category).map(|h| h.value().clone()) else {
            return false;
        };
        if !handle.cancel.is_cancelled() {
            info!(job_id = %handle.id, category = %category, "Stop requested");
            handle.emitter.log(LogLevel::Warn, "Stop requested");
            handle.cancel.cancel();
        }
        true
    }

    /// Hold the running job of `category` between work items. In-flight
    /// items finish; `stop` still cancels a paused job.
    pub fn pause(&self, category: JobCategory) -> bool {
        let Some(handle) = self.slots.get(&category).map(|h| h.value().clone()) else {
            return false;
        };
        if handle.pause.pause() {
            info!(job_id = %handle.id, category = %category, "Job paused");
            handle.emitter.log(LogLevel::Warn, "Job paused");
        }
        true
    }

    pub fn resume(&self, category: JobCategory) -> bool {
        let Some(handle) = self.slots.get(&category).map(|h| h.value().clone()) else {
            return false;
        };
        if handle.pause.resume() {
            info!(job_id = %handle.id, category = %category, "Job resumed");
            handle.emitter.info("Job resumed");
        }
        true
    }

    pub fn stop_all(&self) {
        for category in JobCategory::ALL {
            self.stop(category);
        }
    }

    /// The running job of `category`, or the most recent finished one.
    pub fn status(&self, category: JobCategory) -> Option<JobSnapshot> {
        self.slots
            .get(&category)
            .map(|h| h.snapshot())
            .or_else(|| self.last.get(&category).map(|h| h.snapshot()))
    }

    pub fn running(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self.slots.iter().map(|h| h.snapshot()).collect();
        jobs.sort_by_key(|j| j.category);
        jobs
    }

    pub fn is_running(&self, category: JobCategory) -> bool {
        self.slots.contains_key(&category)
    }

    /// Wait for the running job of `category`, if any.
    pub async fn wait(&self, category: JobCategory) -> Option<JobOutcome> {
        let handle = self.slots.get(&category).map(|h| h.value().clone())?;
        Some(handle.wait().await)
    }
}

/// Run the pipeline on its own task so a panic still produces a terminal
/// outcome, then release the slot and publish `complete`.
async fn supervise(runner: JobRunner, handle: Arc<JobHandle>, slots: Arc<DashMap<JobCategory, Arc<JobHandle>>>) {
    let started = Instant::now();
    let result = tokio::spawn(runner.run()).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let (status, error) = match result {
        Ok(Ok(())) if handle.cancel.is_cancelled() => (JobStatus::Cancelled, None),
        Ok(Ok(())) => (JobStatus::Completed, None),
        Ok(Err(EngineError::Cancelled)) => (JobStatus::Cancelled, None),
        Ok(Err(e)) => {
            error!(job_id = %handle.id, category = %handle.category, error = %e, "Pipeline failed");
            (JobStatus::Failed, Some(e.to_string()))
        }
        Err(e) => {
            error!(job_id = %handle.id, category = %handle.category, error = %e, "Pipeline task panicked");
            (JobStatus::Failed, Some(format!("Pipeline panicked: {}", e)))
        }
    };
    if let Some(message) = &error {
        handle.emitter.log(LogLevel::Error, message.clone());
    }

    let outcome = compute_outcome(status, handle.counters.stats(), duration_ms, error);
    if slots.remove_if(&handle.category, |_, current| current.id == handle.id).is_none() {
        warn!(job_id = %handle.id, category = %handle.category, "Job slot already released");
    }
    handle.finish(outcome.clone());

    info!(
        job_id = %handle.id,
        category = %handle.category,
        status = %outcome.status,
        dispatched = outcome.dispatched,
        completed = outcome.completed,
        findings = outcome.findings,
        duration_ms = outcome.duration_ms,
        "Job finished"
    );
    handle.emitter.complete(outcome);
}
