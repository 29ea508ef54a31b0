//! Run-wide abort flag shared by every worker of one computation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    raised: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Raises the signal if the holder unwinds.
    pub fn guard(&self) -> PanicGuard {
        PanicGuard { signal: self.clone() }
    }
}

pub struct PanicGuard {
    signal: AbortSignal,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("worker panicked, aborting run");
            self.signal.raise();
        }
    }
}
