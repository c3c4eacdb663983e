use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use crate::errors::EngineError;
use crate::pipeline::category::JobCategory;
use crate::pipeline::state::JobOutcome;
use super::Database;

#[derive(Debug, Clone, Serialize)]
pub struct StoredJob {
    pub id: String,
    pub category: String,
    pub status: String,
    pub dispatched: u64,
    pub completed: u64,
    pub findings: u64,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> EngineError + '_ {
    move |e| EngineError::Database(format!("{}: {}", context, e))
}

impl Database {
    /// Register a job the first time one of its events is seen.
    pub fn create_job(&self, id: Uuid, category: JobCategory, started_at: DateTime<Utc>) -> Result<(), EngineError> {
        self.lock()?
            .execute(
                "INSERT OR IGNORE INTO jobs (id, category, status, started_at) VALUES (?1, ?2, 'running', ?3)",
                rusqlite::params![id.to_string(), category.as_str(), started_at.to_rfc3339()],
            )
            .map_err(db_err("Failed to create job"))?;
        Ok(())
    }

    pub fn finish_job(&self, id: Uuid, outcome: &JobOutcome) -> Result<(), EngineError> {
        self.lock()?
            .execute(
                "UPDATE jobs SET status = ?2, dispatched = ?3, completed = ?4, findings = ?5, duration_ms = ?6, error_message = ?7, finished_at = ?8 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    outcome.status.as_str(),
                    outcome.dispatched as i64,
                    outcome.completed as i64,
                    outcome.findings as i64,
                    outcome.duration_ms as i64,
                    outcome.error,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(db_err("Failed to finish job"))?;
        Ok(())
    }

    pub fn get_job(&self, id: Uuid) -> Result<Option<StoredJob>, EngineError> {
        Ok(self
            .query_jobs("WHERE id = ?1", rusqlite::params![id.to_string()])?
            .into_iter()
            .next())
    }

    /// Most recent jobs first.
    pub fn list_jobs(&self, limit: usize) -> Result<Vec<StoredJob>, EngineError> {
        self.query_jobs("ORDER BY started_at DESC LIMIT ?1", rusqlite::params![limit as i64])
    }

    fn query_jobs(&self, clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<StoredJob>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, category, status, dispatched, completed, findings, duration_ms, error_message, started_at, finished_at FROM jobs {}",
                clause
            ))
            .map_err(db_err("Query failed"))?;

        let rows = stmt
            .query_map(params, |row: &rusqlite::Row| {
                Ok(StoredJob {
                    id: row.get(0)?,
                    category: row.get(1)?,
                    status: row.get(2)?,
                    dispatched: row.get::<_, i64>(3)? as u64,
                    completed: row.get::<_, i64>(4)? as u64,
                    findings: row.get::<_, i64>(5)? as u64,
                    duration_ms: row.get::<_, i64>(6)? as u64,
                    error: row.get(7)?,
                    started_at: row.get(8)?,
                    finished_at: row.get(9)?,
                })
            })
            .map_err(db_err("Query error"))?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row.map_err(db_err("Row error"))?);
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::JobStatus;

    #[test]
    fn test_job_lifecycle() {
        let db = Database::in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_job(id, JobCategory::PortScan, Utc::now()).unwrap();
        // A second sighting is ignored
        db.create_job(id, JobCategory::PortScan, Utc::now()).unwrap();

        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.status, "running");
        assert_eq!(job.category, "port-scan");

        let outcome = JobOutcome {
            status: JobStatus::Cancelled,
            dispatched: 10,
            completed: 8,
            findings: 2,
            duration_ms: 150,
            error: None,
        };
        db.finish_job(id, &outcome).unwrap();
        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.status, "cancelled");
        assert_eq!(job.completed, 8);
        assert!(job.finished_at.is_some());

        assert_eq!(db.list_jobs(10).unwrap().len(), 1);
        assert!(db.get_job(Uuid::new_v4()).unwrap().is_none());
    }
}
