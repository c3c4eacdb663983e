use super::types::EngineError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    /// Whether the error ends the job, as opposed to being recorded as an
    /// absent finding or a result field.
    pub fatal_to_job: bool,
}

impl EngineError {
    /// Classify this error to decide how the pipeline reports it.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Rejected before any work starts
            EngineError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                fatal_to_job: true,
            },
            EngineError::Parse { .. } => ErrorClassification {
                error_type: "ConfigError",
                fatal_to_job: true,
            },
            EngineError::AlreadyRunning(_) => ErrorClassification {
                error_type: "ConflictError",
                fatal_to_job: true,
            },
            EngineError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                fatal_to_job: true,
            },
            EngineError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                fatal_to_job: false,
            },

            // Per-item failures, recorded as absence
            EngineError::Probe(_) => ErrorClassification {
                error_type: "ProbeError",
                fatal_to_job: false,
            },
            EngineError::Timeout(_) => ErrorClassification {
                error_type: "ProbeError",
                fatal_to_job: false,
            },
            EngineError::Http(_) => ErrorClassification {
                error_type: "ProbeError",
                fatal_to_job: false,
            },
            EngineError::Io(_) => ErrorClassification {
                error_type: "ProbeError",
                fatal_to_job: false,
            },

            // Reported as a result carrying an error field
            EngineError::Execution(_) => ErrorClassification {
                error_type: "ExecutionError",
                fatal_to_job: false,
            },
            EngineError::Json(_) => ErrorClassification {
                error_type: "ExecutionError",
                fatal_to_job: false,
            },
            EngineError::Yaml(_) => ErrorClassification {
                error_type: "ExecutionError",
                fatal_to_job: false,
            },

            EngineError::Cancelled => ErrorClassification {
                error_type: "CancelledError",
                fatal_to_job: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::category::JobCategory;

    #[test]
    fn test_config_error_is_fatal() {
        let err = EngineError::Config("empty target".into());
        let class = err.classify();
        assert!(class.fatal_to_job);
        assert_eq!(class.error_type, "ConfigError");
    }

    #[test]
    fn test_parse_error_classified_as_config() {
        let err = EngineError::parse("80-");
        assert_eq!(err.classify().error_type, "ConfigError");
        assert_eq!(err.to_string(), "Parse error: invalid token '80-'");
    }

    #[test]
    fn test_conflict_error() {
        let err = EngineError::AlreadyRunning(JobCategory::PortScan);
        let class = err.classify();
        assert_eq!(class.error_type, "ConflictError");
        assert_eq!(err.to_string(), "A port-scan job is already running");
    }

    #[test]
    fn test_probe_errors_not_fatal() {
        assert!(!EngineError::Probe("connection refused".into()).classify().fatal_to_job);
        assert!(!EngineError::Timeout("connect".into()).classify().fatal_to_job);
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(!EngineError::Io(io).classify().fatal_to_job);
    }

    #[test]
    fn test_execution_error_not_fatal() {
        let err = EngineError::Execution("interpreter not found".into());
        let class = err.classify();
        assert!(!class.fatal_to_job);
        assert_eq!(class.error_type, "ExecutionError");
    }

    #[test]
    fn test_cancelled_distinct_type() {
        assert_eq!(EngineError::Cancelled.classify().error_type, "CancelledError");
    }
}
