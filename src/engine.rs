use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use crate::config::EngineConfig;
use crate::db::{Database, Recorder};
use crate::errors::EngineError;
use crate::events::EventBus;
use crate::pipeline::{JobCategory, JobController};
use crate::probes::poc::SystemInterpreterLocator;
use crate::targets::FileDictionaries;

const RECORDER_DRAIN: Duration = Duration::from_secs(2);

/// Wires the bus, the controller and the optional recorder from one
/// `EngineConfig`. Shared by the CLI and the API server.
pub struct Engine {
    pub config: Arc<EngineConfig>,
    pub bus: Arc<EventBus>,
    pub controller: Arc<JobController>,
    pub database: Option<Database>,
    recorder: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let config = Arc::new(config);
        let bus = Arc::new(EventBus::with_capacity(config.events.channel_capacity));
        let dictionaries = Arc::new(FileDictionaries::new(config.dictionaries.dir.clone()));
        let locator = Arc::new(SystemInterpreterLocator::new(config.interpreter.path.clone()));
        let controller = Arc::new(JobController::new(config.clone(), bus.clone(), dictionaries, locator));

        let (database, recorder) = match &config.storage.database {
            Some(path) => {
                let db = Database::new(path)?;
                info!(path = %path.display(), "Recording results");
                let recorder = Recorder::spawn(Arc::new(db.clone()), bus.subscribe_all());
                (Some(db), Some(recorder))
            }
            None => (None, None),
        };

        Ok(Self { config, bus, controller, database, recorder })
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Stop every job, wait for their terminal events and let the recorder
    /// drain. The recorder ends once the last bus handle is gone.
    pub async fn shutdown(self) {
        let Engine { controller, bus, recorder, .. } = self;
        controller.stop_all();
        for category in JobCategory::ALL {
            controller.wait(category).await;
        }
        drop(controller);
        drop(bus);

        if let Some(recorder) = recorder {
            if tokio::time::timeout(RECORDER_DRAIN, recorder).await.is_err() {
                warn!("Recorder did not drain in time, some events may be unrecorded");
            }
        }
    }
}
