//! Load schedulers: turn a profile's desired RPS into concrete dispatches.
//!
//! Two interchangeable realizations. The interval scheduler runs a single
//! cooperative worker that sleeps the profile's inter-arrival delay between
//! sends; the tick scheduler emits `floor(rps * tick + carry)` dispatches on
//! a fixed period. Both guarantee that no dispatch happens after `stop()`,
//! that exactly one completion signal fires, and that the worker cleans up.

mod interval;
mod tick;

#[cfg(test)]
mod tests;

pub use interval::IntervalScheduler;
pub use tick::TickScheduler;

use async_trait::async_trait;
use tokio::sync::watch;

/// Seam between the scheduler and the dispatcher.
///
/// `send` returns once the dispatch has been handed off to the outbound
/// pool (or once the concurrency cap admits it), never when the response
/// arrives, so the scheduler's timing is preserved.
#[async_trait]
pub trait RequestSender: Send + Sync + 'static {
    async fn send(&self);
}

/// Scheduler outcome delivered through [`Completion`].
pub type SchedulerOutcome = Result<(), String>;

/// Single-shot completion signal that any number of observers can await.
#[derive(Clone)]
pub struct Completion {
    tx: watch::Sender<Option<SchedulerOutcome>>,
}

impl Completion {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Record the outcome; only the first call wins.
    pub(crate) fn finish(&self, outcome: SchedulerOutcome) -> bool {
        let mut first = false;
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(outcome.clone());
                first = true;
                return true;
            }
            false
        });
        first
    }

    /// Wait until the scheduler finishes and return its outcome.
    pub async fn wait(&self) -> SchedulerOutcome {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Err("scheduler dropped without completing".to_string());
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tx.borrow().is_some()
    }
}
