use serde::Serialize;
use crate::db::findings::StoredFinding;
use crate::db::jobs::StoredJob;
use crate::pipeline::JobSnapshot;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<&'static str>,
    pub running_jobs: usize,
    pub recording: bool,
}

#[derive(Serialize)]
pub struct JobsResponse {
    pub running: Vec<JobSnapshot>,
    /// Latest job per category, running or finished.
    pub latest: Vec<JobSnapshot>,
}

#[derive(Serialize)]
pub struct StopResponse {
    pub category: String,
    pub stopped: bool,
}

#[derive(Serialize)]
pub struct PauseResponse {
    pub category: String,
    /// False when the category had no running job.
    pub found: bool,
    pub paused: bool,
}

#[derive(Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub job: StoredJob,
    pub findings: Vec<StoredFinding>,
}
