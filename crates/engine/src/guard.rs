use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Admits at most one batch at a time; later callers fail fast instead of queueing.
#[derive(Debug, Clone, Default)]
pub struct BatchGate {
    busy: Arc<AtomicBool>,
}

impl BatchGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<BatchPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BatchPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of a batch; releases the gate on drop.
#[derive(Debug)]
pub struct BatchPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for BatchPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
