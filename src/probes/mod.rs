pub mod credential;
pub mod http_path;
pub mod js_mine;
pub mod liveness;
pub mod net;
pub mod poc;
pub mod port;
pub mod secrets;
pub mod service;

use std::time::Duration;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use crate::events::JobEmitter;
use crate::models::record::ResultRecord;
use crate::pipeline::pause::PauseGate;

/// Everything a probe may need from its job, passed explicitly.
#[derive(Clone)]
pub struct ProbeContext {
    pub cancel: CancellationToken,
    pub emitter: JobEmitter,
    pub pause: PauseGate,
    /// Per-operation network deadline (connect, read, request).
    pub timeout: Duration,
}

/// A single unit of protocol work. `None` means "no finding", which also
/// covers unreachable targets and transport errors.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    type Item: Send + 'static;

    async fn probe(&self, item: Self::Item, ctx: &ProbeContext) -> Option<ResultRecord>;
}
