//! Cooperative pacing, cancellation and progress reporting for long batches.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use textvar_protocol::ProgressUpdate;

/// Yields control between chunks so the host stays responsive.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Never suspends.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

#[async_trait]
impl Pacer for NoPause {
    async fn pause(&self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YieldNow;

#[async_trait]
impl Pacer for YieldNow {
    async fn pause(&self) {
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SleepPause(pub Duration);

#[async_trait]
impl Pacer for SleepPause {
    async fn pause(&self) {
        tokio::time::sleep(self.0).await;
    }
}

/// `0` yields without sleeping.
pub fn pacer_for_ms(pause_ms: u64) -> Arc<dyn Pacer> {
    if pause_ms == 0 {
        Arc::new(YieldNow)
    } else {
        Arc::new(SleepPause(Duration::from_millis(pause_ms)))
    }
}

/// Shared request to stop the running batch at its next checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Receives one update after every chunk.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _update: ProgressUpdate) {}
}
