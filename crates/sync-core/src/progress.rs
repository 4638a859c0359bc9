//! Progress notification.
//!
//! Sources and mappers report advancement through a [`ProgressSink`]. Ticks
//! are fire-and-forget: a sink never fails and the default sink does nothing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receiver of "advance by N" notifications.
pub trait ProgressSink: Send + Sync {
    /// Advance the progress indicator by `amount`.
    fn tick(&self, amount: u64);
}

/// Sink that discards every tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn tick(&self, _amount: u64) {}
}

/// Sink that logs through `tracing` each time another `every` ticks accumulate.
#[derive(Debug)]
pub struct LogProgress {
    label: String,
    total: Option<u64>,
    every: u64,
    done: AtomicU64,
}

impl LogProgress {
    pub fn new(label: impl Into<String>, total: Option<u64>, every: u64) -> Self {
        Self {
            label: label.into(),
            total,
            every: every.max(1),
            done: AtomicU64::new(0),
        }
    }

    /// Ticks received so far.
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogProgress {
    fn tick(&self, amount: u64) {
        if amount == 0 {
            return;
        }
        let before = self.done.fetch_add(amount, Ordering::Relaxed);
        let after = before + amount;
        if before / self.every != after / self.every || Some(after) == self.total {
            match self.total {
                Some(total) => tracing::info!("{}: {}/{}", self.label, after, total),
                None => tracing::info!("{}: {}", self.label, after),
            }
        }
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<T> {
    fn tick(&self, amount: u64) {
        (**self).tick(amount)
    }
}
