use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::info;

use crate::engine::Engine;

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(2000);

/// Drives [`Engine::tick`] on a fixed period.
///
/// Idle until [`start`](TickScheduler::start), running until
/// [`stop`](TickScheduler::stop). The loop awaits each tick before waiting
/// for the next one, so ticks never overlap; if a tick overruns the period
/// the missed firings are skipped rather than queued.
pub struct TickScheduler {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        TickScheduler { period, task: None }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Register the timer. The first tick fires one period from now. Calling
    /// this while already running does nothing.
    pub fn start(&mut self, engine: Arc<Engine>) {
        if self.is_running() {
            return;
        }

        let period = self.period;
        let first = Instant::now() + period;
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                engine.tick().await;
            }
        });

        info!("Traffic simulator started (tick={}ms)", period.as_millis());
        self.task = Some(task);
    }

    /// Cancel the timer. Safe to call when idle.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Traffic simulator stopped");
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
