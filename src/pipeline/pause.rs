use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Shared pause switch for one job. Workers park on it between items.
#[derive(Clone)]
pub struct PauseGate {
    state: Arc<watch::Sender<bool>>,
}

impl Default for PauseGate {
    fn default() -> Self {
        let (state, _) = watch::channel(false);
        Self { state: Arc::new(state) }
    }
}

impl PauseGate {
    /// Returns `false` when the job was already paused.
    pub fn pause(&self) -> bool {
        self.state.send_if_modified(|paused| !std::mem::replace(paused, true))
    }

    /// Returns `false` when the job was not paused.
    pub fn resume(&self) -> bool {
        self.state.send_if_modified(|paused| std::mem::replace(paused, false))
    }

    pub fn is_paused(&self) -> bool {
        *self.state.borrow()
    }

    /// Block while paused. Cancellation releases the wait.
    pub async fn wait(&self, cancel: &CancellationToken) {
        if !self.is_paused() {
            return;
        }
        let mut rx = self.state.subscribe();
        tokio::select! {
            _ = async { let _ = rx.wait_for(|paused| !*paused).await; } => {}
            _ = cancel.cancelled() => {}
        }
    }
}
