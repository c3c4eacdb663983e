use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};
use crate::errors::EngineError;
use crate::probes::{Probe, ProbeContext};
use super::metrics::{JobCounters, PoolStats};

/// Queue slots per worker between the producer and the workers.
const QUEUE_FACTOR: usize = 4;

/// Fixed-size worker pool draining a lazily produced stream of work items.
#[derive(Clone)]
pub struct WorkerPool {
    concurrency: usize,
    item_timeout: Duration,
    counters: Arc<JobCounters>,
    report_progress: bool,
}

impl WorkerPool {
    pub fn new(concurrency: usize, item_timeout: Duration, counters: Arc<JobCounters>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            item_timeout,
            counters,
            report_progress: true,
        }
    }

    /// A pool that never publishes progress, for helper passes whose
    /// counters are not the job's.
    pub fn quiet(mut self) -> Self {
        self.report_progress = false;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn item_timeout(&self) -> Duration {
        self.item_timeout
    }

    pub fn counters(&self) -> &Arc<JobCounters> {
        &self.counters
    }

    /// Run `probe` over every item until the iterator is exhausted or the job
    /// is cancelled. `total` is only used for progress events.
    pub async fn run<P, I>(
        &self,
        items: I,
        probe: Arc<P>,
        ctx: &ProbeContext,
        total: Option<u64>,
    ) -> Result<PoolStats, EngineError>
    where
        P: Probe,
        I: Iterator<Item = P::Item> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<P::Item>(self.concurrency * QUEUE_FACTOR);
        let rx = Arc::new(Mutex::new(rx));

        let producer = {
            let cancel = ctx.cancel.clone();
            let counters = self.counters.clone();
            tokio::spawn(async move {
                for item in items {
                    if cancel.is_cancelled() {
                        break;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        sent = tx.send(item) => {
                            if sent.is_err() {
                                break;
                            }
                            counters.add_dispatched(1);
                        }
                    }
                }
            })
        };

        let step = progress_step(total);
        let mut workers = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let rx = rx.clone();
            let probe = probe.clone();
            let ctx = ctx.clone();
            let counters = self.counters.clone();
            let item_timeout = self.item_timeout;
            let report_progress = self.report_progress;

            workers.push(tokio::spawn(async move {
                loop {
                    ctx.pause.wait(&ctx.cancel).await;
                    let next = tokio::select! {
                        biased;
                        _ = ctx.cancel.cancelled() => None,
                        item = async { rx.lock().await.recv().await } => item,
                    };
                    let Some(item) = next else { break };

                    let outcome = tokio::select! {
                        biased;
                        _ = ctx.cancel.cancelled() => None,
                        r = tokio::time::timeout(item_timeout, probe.probe(item, &ctx)) => Some(r),
                    };
                    let done = counters.add_completed(1);

                    match outcome {
                        Some(Ok(Some(record))) if !ctx.cancel.is_cancelled() => {
                            counters.add_findings(1);
                            ctx.emitter.result(record);
                        }
                        Some(Err(_)) => {
                            debug!(worker_id, timeout_ms = item_timeout.as_millis() as u64, "Work item timed out");
                        }
                        _ => {}
                    }

                    if report_progress && done % step == 0 && !ctx.cancel.is_cancelled() {
                        ctx.emitter.progress(done, total);
                    }
                }
            }));
        }

        let mut panicked = None;
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task failed");
                panicked.get_or_insert_with(|| e.to_string());
            }
        }
        // Workers stopped early, unblock the producer if it is still waiting
        drop(rx);
        let _ = producer.await;

        if let Some(e) = panicked {
            return Err(EngineError::Internal(format!("worker failed: {}", e)));
        }

        if self.report_progress && !ctx.cancel.is_cancelled() {
            ctx.emitter.progress(self.counters.completed(), total);
        }
        Ok(self.counters.stats())
    }
}

fn progress_step(total: Option<u64>) -> u64 {
    match total {
        Some(t) => (t / 20).clamp(1, 500),
        None => 25,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;
    use crate::pipeline::pause::PauseGate;
    use uuid::Uuid;
    use crate::events::{EventBus, JobEmitter};
    use crate::models::record::ResultRecord;
    use crate::pipeline::category::JobCategory;

    struct EvenProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl Probe for EvenProbe {
        type Item = u64;

        async fn probe(&self, item: u64, _ctx: &ProbeContext) -> Option<ResultRecord> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (item % 2 == 0).then(|| ResultRecord::VerifiedEndpoint {
                url: format!("http://h/{}", item),
                status: 200,
                timestamp: Utc::now(),
            })
        }
    }

    fn context(bus: &Arc<EventBus>) -> ProbeContext {
        ProbeContext {
            cancel: CancellationToken::new(),
            pause: PauseGate::default(),
            emitter: JobEmitter::new(bus.clone(), Uuid::new_v4(), JobCategory::JsMine),
            timeout: Duration::from_millis(500),
        }
    }

    fn probe(delay_ms: u64) -> Arc<EvenProbe> {
        Arc::new(EvenProbe {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay: Duration::from_millis(delay_ms),
        })
    }

    #[tokio::test]
    async fn test_pool_drains_all_items_within_concurrency() {
        let bus = Arc::new(EventBus::new());
        let ctx = context(&bus);
        let pool = WorkerPool::new(3, Duration::from_secs(1), Arc::new(JobCounters::default()));
        let probe = probe(5);

        let stats = pool.run(0..20u64, probe.clone(), &ctx, Some(20)).await.unwrap();
        assert_eq!(stats, PoolStats { dispatched: 20, completed: 20, findings: 10 });
        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_timeouts_are_absence() {
        let bus = Arc::new(EventBus::new());
        let ctx = context(&bus);
        let pool = WorkerPool::new(2, Duration::from_millis(10), Arc::new(JobCounters::default()));

        let stats = pool.run(0..4u64, probe(200), &ctx, None).await.unwrap();
        assert_eq!(stats.completed, 4);
        assert_eq!(stats.findings, 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch() {
        let bus = Arc::new(EventBus::new());
        let ctx = context(&bus);
        let pool = WorkerPool::new(2, Duration::from_secs(5), Arc::new(JobCounters::default()));

        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            cancel.cancel();
        });

        let started = std::time::Instant::now();
        let stats = pool.run(0..1_000_000u64, probe(20), &ctx, None).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(stats.dispatched < 1_000_000);
        assert!(stats.completed <= stats.dispatched);
    }

    #[tokio::test]
    async fn test_paused_pool_holds_items_until_resumed() {
        let bus = Arc::new(EventBus::new());
        let ctx = context(&bus);
        let counters = Arc::new(JobCounters::default());
        let pool = WorkerPool::new(2, Duration::from_secs(1), counters.clone());
        ctx.pause.pause();

        let run = {
            let ctx = ctx.clone();
            tokio::spawn(async move { pool.run(0..10u64, probe(1), &ctx, Some(10)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counters.completed(), 0);

        ctx.pause.resume();
        let stats = tokio::time::timeout(Duration::from_secs(2), run).await.unwrap().unwrap().unwrap();
        assert_eq!(stats.completed, 10);
    }

    #[tokio::test]
    async fn test_quiet_pool_publishes_no_progress() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe(JobCategory::JsMine);
        let ctx = context(&bus);
        let pool = WorkerPool::new(2, Duration::from_secs(1), Arc::new(JobCounters::default())).quiet();

        pool.run(0..40u64, probe(0), &ctx, None).await.unwrap();
        let mut results = 0;
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), sub.next()).await {
            assert!(
                !matches!(event.payload, crate::events::EventPayload::Progress { .. }),
                "unexpected progress {:?}",
                event
            );
            results += 1;
        }
        assert_eq!(results, 20);
    }

    #[tokio::test]
    async fn test_no_results_published_once_cancelled() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe(JobCategory::JsMine);
        let ctx = context(&bus);
        ctx.cancel.cancel();
        let pool = WorkerPool::new(4, Duration::from_secs(1), Arc::new(JobCounters::default()));

        let stats = pool.run(0..100u64, probe(1), &ctx, Some(100)).await.unwrap();
        assert_eq!(stats.findings, 0);
        let next = tokio::time::timeout(Duration::from_millis(50), sub.next()).await;
        assert!(next.is_err(), "unexpected event {:?}", next);
    }
}
