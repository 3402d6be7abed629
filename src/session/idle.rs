//! Periodic idle sweep.

use std::sync::Weak;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

/// Default sweep interval.
pub const DEFAULT_IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Something the idle checker sweeps.
pub trait IdleSweep: Send + Sync {
    /// Demote sessions that have been silent for longer than their timeout.
    fn sweep_idle(&self, now: Instant);
}

/// One interval timer for all sessions.
///
/// Holds a weak reference to its target, so a dropped manager stops the
/// sweep on the next tick even if [`stop`](Self::stop) was never called.
#[derive(Debug)]
pub struct IdleChecker {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl IdleChecker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }

    /// Start sweeping `target` every interval. Restarts if already running.
    pub fn start(&mut self, runtime: &Handle, target: Weak<dyn IdleSweep>) {
        self.stop();

        let interval = self.interval;
        self.task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(target) = target.upgrade() else {
                    tracing::debug!("idle checker target dropped, stopping");
                    break;
                };
                target.sweep_idle(Instant::now());
            }
        }));
    }

    /// Stop sweeping.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for IdleChecker {
    fn drop(&mut self) {
        self.stop();
    }
}
