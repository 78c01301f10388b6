//! Run context: cancellation and progress reporting
//!
//! These let the engine be driven from a CLI, a test, or anything else
//! without depending on a particular signal handler or UI.

use crate::error::{Error, Result};
use crate::types::{Change, ChangeOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of cancellable sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared cancellation flag for a reconciliation run
///
/// Cloning yields a handle to the same flag. Once cancelled, a token stays
/// cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. Safe to call from a signal handler.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return `Err(Error::Cancelled)` if the token has tripped
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Sleep for `duration`, waking early if cancelled
    ///
    /// Returns `false` if the sleep was cut short by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// Progress callback for apply runs
///
/// Implement this trait to receive progress updates while changes are applied.
pub trait ApplyProgress {
    /// Called once with the number of changes about to be applied
    fn on_start(&mut self, total: usize);

    /// Called before a change is applied
    fn on_change_start(&mut self, index: usize, change: &Change);

    /// Called after a change completed without a fatal error
    fn on_change_complete(&mut self, index: usize, change: &Change, outcome: &ChangeOutcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ApplyProgress for NoProgress {
    fn on_start(&mut self, _total: usize) {}
    fn on_change_start(&mut self, _index: usize, _change: &Change) {}
    fn on_change_complete(&mut self, _index: usize, _change: &Change, _outcome: &ChangeOutcome) {}
}
