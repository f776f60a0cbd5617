//! Cooperative cancellation shared by the upload and playback pipelines.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable flag checked between remote calls.
///
/// Setting the flag never interrupts a call that is already in flight; the
/// owning pipeline observes it before issuing the next one.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Creates a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once `cancel` has been called and not yet reset.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clears a previous cancellation so the flag can guard a new attempt.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
