//! One-by-one scheduler driven by the profile's inter-arrival delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::profile::LoadProfile;

use super::{Completion, RequestSender};

const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(100);

pub struct IntervalScheduler {
    duration: Duration,
    idle_delay: Duration,
    profile: Arc<LoadProfile>,
    sender: Arc<dyn RequestSender>,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    started: AtomicBool,
    completion: Completion,
}

impl IntervalScheduler {
    pub fn new(
        duration: Duration,
        idle_delay: Duration,
        profile: Arc<LoadProfile>,
        sender: Arc<dyn RequestSender>,
    ) -> Self {
        let idle_delay = if idle_delay < Duration::from_millis(1) {
            DEFAULT_IDLE_DELAY
        } else {
            idle_delay
        };
        Self {
            duration,
            idle_delay,
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
        let idle_delay = self.idle_delay;
        let profile = Arc::clone(&self.profile);
        let sender = Arc::clone(&self.sender);
        let cancel = self.cancel.clone();
        let running = Arc::clone(&self.running);
        let completion = self.completion.clone();

        let worker = tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    return;
                }
                let elapsed = start.elapsed();
                if elapsed >= duration {
                    return;
                }
                let rps = profile.current_rps(elapsed);
                if rps <= 0.0 {
                    if sleep_interrupted(&cancel, idle_delay).await {
                        return;
                    }
                    continue;
                }
                let delay = profile.next_delay(elapsed);
                if !delay.is_zero() && sleep_interrupted(&cancel, delay).await {
                    return;
                }
                if cancel.is_cancelled() || start.elapsed() >= duration {
                    return;
                }
                sender.send().await;
            }
        });

        tokio::spawn(async move {
            let outcome = match worker.await {
                Ok(()) => Ok(()),
                Err(e) => Err(format!("interval scheduler worker failed: {e}")),
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

/// Sleep that wakes early on cancellation; returns true when cancelled.
async fn sleep_interrupted(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
