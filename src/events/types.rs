use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::models::record::ResultRecord;
use crate::pipeline::category::JobCategory;
use crate::pipeline::state::JobOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Messages published by a running job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventPayload {
    /// Human-readable progress line
    Log {
        level: LogLevel,
        message: String,
    },
    /// A new finding
    Result {
        record: ResultRecord,
    },
    /// Work items finished so far
    Progress {
        completed: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },
    /// Terminal signal, published exactly once per job
    Complete {
        outcome: JobOutcome,
    },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::Result { .. } => "result",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub category: JobCategory,
    /// Publish order within the job, starting at 0.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl JobEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self.payload, EventPayload::Complete { .. })
    }

    pub fn record(&self) -> Option<&ResultRecord> {
        match &self.payload {
            EventPayload::Result { record } => Some(record),
            _ => None,
        }
    }
}
