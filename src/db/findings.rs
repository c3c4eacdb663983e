use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;
use crate::errors::EngineError;
use crate::models::record::ResultRecord;
use crate::pipeline::category::JobCategory;
use super::Database;

#[derive(Debug, Clone, Serialize)]
pub struct StoredFinding {
    pub job_id: String,
    pub category: String,
    pub target: String,
    pub record: ResultRecord,
    pub created_at: String,
}

impl Database {
    pub fn insert_finding(&self, job_id: Uuid, category: JobCategory, record: &ResultRecord) -> Result<(), EngineError> {
        let json = serde_json::to_string(record)?;
        self.lock()?
            .execute(
                "INSERT INTO findings (job_id, category, target, record_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    job_id.to_string(),
                    category.as_str(),
                    record.subject(),
                    json,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| EngineError::Database(format!("Failed to insert finding: {}", e)))?;
        Ok(())
    }

    /// Findings of one job in insertion order.
    pub fn get_findings(&self, job_id: Uuid) -> Result<Vec<StoredFinding>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT job_id, category, target, record_json, created_at FROM findings WHERE job_id = ?1 ORDER BY id",
            )
            .map_err(|e| EngineError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map(rusqlite::params![job_id.to_string()], |row: &rusqlite::Row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| EngineError::Database(format!("Query error: {}", e)))?;

        let mut findings = Vec::new();
        for row in rows {
            let (job_id, category, target, json, created_at) =
                row.map_err(|e| EngineError::Database(format!("Row error: {}", e)))?;
            findings.push(StoredFinding {
                job_id,
                category,
                target,
                record: serde_json::from_str(&json)?,
                created_at,
            });
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Transport;

    #[test]
    fn test_db_insert_and_get_findings() {
        let db = Database::in_memory().unwrap();
        let job = Uuid::new_v4();
        db.create_job(job, JobCategory::PortScan, Utc::now()).unwrap();

        let record = ResultRecord::OpenPort {
            host: "127.0.0.1".into(),
            port: 22,
            transport: Transport::Tcp,
            state: "open".into(),
            rtt_ms: 1,
            service: "ssh".into(),
            banner: Some("SSH-2.0-OpenSSH_9.6".into()),
            timestamp: Utc::now(),
        };
        db.insert_finding(job, JobCategory::PortScan, &record).unwrap();

        let results = db.get_findings(job).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target, "127.0.0.1:22");
        assert_eq!(results[0].category, "port-scan");
        assert!(matches!(results[0].record, ResultRecord::OpenPort { port: 22, .. }));
    }

    #[test]
    fn test_finding_requires_job() {
        let db = Database::in_memory().unwrap();
        let record = ResultRecord::VerifiedEndpoint { url: "http://h/api".into(), status: 200, timestamp: Utc::now() };
        assert!(db.insert_finding(Uuid::new_v4(), JobCategory::JsMine, &record).is_err());
    }
}
