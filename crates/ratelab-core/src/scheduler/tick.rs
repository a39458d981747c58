//! Fixed-period scheduler with fractional carry-over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::profile::LoadProfile;

use super::{Completion, RequestSender};

const DEFAULT_TICK: Duration = Duration::from_millis(100);

pub struct TickScheduler {
    duration: Duration,
    tick: Duration,
    profile: Arc<LoadProfile>,
    sender: Arc<dyn RequestSender>,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    started: AtomicBool,
    completion: Completion,
}

impl TickScheduler {
    pub fn new(
        duration: Duration,
        tick: Duration,
        profile: Arc<LoadProfile>,
        sender: Arc<dyn RequestSender>,
    ) -> Self {
        let tick = if tick.is_zero() { DEFAULT_TICK } else { tick };
        Self {
            duration,
            tick,
            profile,
            sender,
            cancel: CancellationToken::new(),
            running: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            completion: Completion::new(),
        }
    }

    pub fn start(&self, start: Instant) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let duration = self.duration;
        let tick = self.tick;
        let profile = Arc::clone(&self.profile);
        let sender = Arc::clone(&self.sender);
        let cancel = self.cancel.clone();
        let running = Arc::clone(&self.running);
        let completion = self.completion.clone();

        let worker = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            let mut carry = 0.0_f64;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let elapsed = start.elapsed();
                if elapsed >= duration {
                    return;
                }
                let rps = profile.current_rps(elapsed).max(0.0);
                let expected = rps * tick.as_secs_f64() + carry;
                let to_send = expected.floor() as u64;
                carry = expected - to_send as f64;
                for _ in 0..to_send {
                    if cancel.is_cancelled() {
                        return;
                    }
                    sender.send().await;
                }
            }
        });

        tokio::spawn(async move {
            let outcome = match worker.await {
                Ok(()) => Ok(()),
                Err(e) => Err(format!("tick scheduler worker failed: {e}")),
            };
            running.store(false, Ordering::SeqCst);
            completion.finish(outcome);
        });
    }

    /// Idempotent; in-flight dispatches are allowed to complete.
    pub fn stop(&self) {
        self.cancel.cancel();
        if !self.started.load(Ordering::SeqCst) {
            self.running.store(false, Ordering::SeqCst);
            self.completion.finish(Ok(()));
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }
}
