use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use chrono::Utc;
use futures::Stream;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use crate::models::record::ResultRecord;
use crate::pipeline::category::JobCategory;
use crate::pipeline::state::JobOutcome;
use super::types::{EventPayload, JobEvent, LogLevel};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Publishing side of the event channel. The job controller only sees this.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: JobEvent);
}

/// Fan-out publish/subscribe keyed by job category.
///
/// Subscribers only observe events published after they subscribe, and an
/// event published with no subscriber attached is dropped.
pub struct EventBus {
    channels: HashMap<JobCategory, broadcast::Sender<JobEvent>>,
    all: broadcast::Sender<JobEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(16);
        let channels = JobCategory::ALL
            .iter()
            .map(|c| (*c, broadcast::channel(capacity).0))
            .collect();
        Self {
            channels,
            all: broadcast::channel(capacity).0,
        }
    }

    pub fn subscribe(&self, category: JobCategory) -> Subscription {
        let rx = match self.channels.get(&category) {
            Some(tx) => tx.subscribe(),
            None => self.all.subscribe(),
        };
        Subscription { rx, label: category.as_str() }
    }

    /// Subscribe to every category at once (recorder, API firehose).
    pub fn subscribe_all(&self) -> Subscription {
        Subscription { rx: self.all.subscribe(), label: "all" }
    }

    pub fn subscriber_count(&self, category: JobCategory) -> usize {
        self.channels.get(&category).map(|tx| tx.receiver_count()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: JobEvent) {
        if let Some(tx) = self.channels.get(&event.category) {
            // Err only means nobody is listening
            let _ = tx.send(event.clone());
        }
        let _ = self.all.send(event);
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<JobEvent>,
    label: &'static str,
}

impl Subscription {
    /// Next event, or `None` once the bus is dropped. Events missed by a
    /// lagging subscriber are skipped.
    pub async fn next(&mut self) -> Option<JobEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = self.label, skipped, "Subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = JobEvent> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|event| (event, sub))
        })
    }
}

/// Per-job publishing handle that stamps job id, category and sequence.
#[derive(Clone)]
pub struct JobEmitter {
    sink: Arc<dyn EventSink>,
    job_id: Uuid,
    category: JobCategory,
    seq: Arc<Mutex<u64>>,
}

impl JobEmitter {
    pub fn new(sink: Arc<dyn EventSink>, job_id: Uuid, category: JobCategory) -> Self {
        Self {
            sink,
            job_id,
            category,
            seq: Arc::new(Mutex::new(0)),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn category(&self) -> JobCategory {
        self.category
    }

    fn emit(&self, payload: EventPayload) {
        // Held across publish so sequence numbers match delivery order
        let mut seq = match self.seq.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.sink.publish(JobEvent {
            job_id: self.job_id,
            category: self.category,
            seq: *seq,
            timestamp: Utc::now(),
            payload,
        });
        *seq += 1;
    }

    /// Publish a log line and mirror it to tracing.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => debug!(job_id = %self.job_id, category = %self.category, "{}", message),
            LogLevel::Info => info!(job_id = %self.job_id, category = %self.category, "{}", message),
            LogLevel::Warn => warn!(job_id = %self.job_id, category = %self.category, "{}", message),
            LogLevel::Error => error!(job_id = %self.job_id, category = %self.category, "{}", message),
        }
        self.emit(EventPayload::Log { level, message });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn result(&self, record: ResultRecord) {
        self.emit(EventPayload::Result { record });
    }

    pub fn progress(&self, completed: u64, total: Option<u64>) {
        self.emit(EventPayload::Progress { completed, total });
    }

    pub fn complete(&self, outcome: JobOutcome) {
        self.emit(EventPayload::Complete { outcome });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn emitter(bus: &Arc<EventBus>, category: JobCategory) -> JobEmitter {
        JobEmitter::new(bus.clone(), Uuid::new_v4(), category)
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_publish_order() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe(JobCategory::PortScan);
        let em = emitter(&bus, JobCategory::PortScan);

        em.info("first");
        em.progress(1, Some(2));
        em.info("second");

        let seqs: Vec<u64> = vec![
            sub.next().await.unwrap().seq,
            sub.next().await.unwrap().seq,
            sub.next().await.unwrap().seq,
        ];
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_events_are_not_replayed() {
        let bus = Arc::new(EventBus::new());
        let em = emitter(&bus, JobCategory::DirScan);
        em.info("dropped, nobody listening");

        let mut sub = bus.subscribe(JobCategory::DirScan);
        em.info("seen");
        let event = sub.next().await.unwrap();
        match event.payload {
            EventPayload::Log { message, .. } => assert_eq!(message, "seen"),
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(event.seq, 1);
    }

    #[tokio::test]
    async fn test_categories_are_isolated() {
        let bus = Arc::new(EventBus::new());
        let mut ports = bus.subscribe(JobCategory::PortScan);
        let mut all = bus.subscribe_all();

        emitter(&bus, JobCategory::Liveness).info("liveness line");
        emitter(&bus, JobCategory::PortScan).info("port line");

        let event = ports.next().await.unwrap();
        assert_eq!(event.category, JobCategory::PortScan);
        assert_eq!(all.next().await.unwrap().category, JobCategory::Liveness);
        assert_eq!(all.next().await.unwrap().category, JobCategory::PortScan);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_fan_out() {
        let bus = Arc::new(EventBus::new());
        let mut a = bus.subscribe(JobCategory::JsMine);
        let mut b = bus.subscribe(JobCategory::JsMine);
        assert_eq!(bus.subscriber_count(JobCategory::JsMine), 2);

        let em = emitter(&bus, JobCategory::JsMine);
        em.result(ResultRecord::VerifiedEndpoint {
            url: "http://h/api".into(),
            status: 200,
            timestamp: Utc::now(),
        });
        assert!(a.next().await.unwrap().record().is_some());
        assert!(b.next().await.unwrap().record().is_some());
    }

    #[tokio::test]
    async fn test_subscription_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(JobCategory::PocVerify);
        drop(bus);
        assert!(sub.next().await.is_none());
    }
}
