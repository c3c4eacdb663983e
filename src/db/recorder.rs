use std::collections::HashSet;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::errors::EngineError;
use crate::events::{EventPayload, JobEvent, Subscription};
use crate::models::record::ResultRecord;
use crate::pipeline::category::JobCategory;
use crate::pipeline::state::JobOutcome;
use super::Database;

/// Optional persistence for findings and job outcomes.
pub trait ResultSink: Send + Sync {
    fn job_seen(&self, job_id: Uuid, category: JobCategory, at: DateTime<Utc>) -> Result<(), EngineError>;
    fn record_result(&self, job_id: Uuid, category: JobCategory, record: &ResultRecord) -> Result<(), EngineError>;
    fn record_outcome(&self, job_id: Uuid, outcome: &JobOutcome) -> Result<(), EngineError>;
}

impl ResultSink for Database {
    fn job_seen(&self, job_id: Uuid, category: JobCategory, at: DateTime<Utc>) -> Result<(), EngineError> {
        self.create_job(job_id, category, at)
    }

    fn record_result(&self, job_id: Uuid, category: JobCategory, record: &ResultRecord) -> Result<(), EngineError> {
        self.insert_finding(job_id, category, record)
    }

    fn record_outcome(&self, job_id: Uuid, outcome: &JobOutcome) -> Result<(), EngineError> {
        self.finish_job(job_id, outcome)
    }
}

/// Drains a bus subscription into a `ResultSink`. Writes run on the
/// blocking pool one event at a time, so they keep bus order. Write failures
/// are logged and never reach the job.
pub struct Recorder;

impl Recorder {
    pub fn spawn(sink: Arc<dyn ResultSink>, mut events: Subscription) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut seen = HashSet::new();
            while let Some(event) = events.next().await {
                let first = seen.insert(event.job_id);
                if event.is_complete() {
                    seen.remove(&event.job_id);
                }
                let sink = sink.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || persist(sink.as_ref(), &event, first)).await {
                    warn!(error = %e, "Recorder write task failed");
                }
            }
            debug!("Recorder stopped");
        })
    }
}

fn persist(sink: &dyn ResultSink, event: &JobEvent, first: bool) {
    if first {
        if let Err(e) = sink.job_seen(event.job_id, event.category, event.timestamp) {
            warn!(job_id = %event.job_id, error = %e, "Failed to record job");
        }
    }
    let written = match &event.payload {
        EventPayload::Result { record } => sink.record_result(event.job_id, event.category, record),
        EventPayload::Complete { outcome } => sink.record_outcome(event.job_id, outcome),
        _ => Ok(()),
    };
    if let Err(e) = written {
        warn!(job_id = %event.job_id, kind = event.payload.kind(), error = %e, "Failed to record event");
    }
}
