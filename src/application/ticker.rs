use crate::application::timer_service::{IntervalTimerService, RunToken, TimerSnapshot};
use crate::domain::interval_machine::{TickOutcome, TransitionRejection};
use crate::infrastructure::history_store::HistoryStore;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub snapshot: TimerSnapshot,
}

pub type TickListener = Arc<dyn Fn(TickReport) + Send + Sync>;

/// Polls the timer service on a fixed interval while the timer runs.
///
/// `start` needs a running tokio runtime.
pub struct TickDriver<S>
where
    S: HistoryStore + 'static,
{
    service: Arc<IntervalTimerService<S>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    listener: Option<TickListener>,
}

impl<S> TickDriver<S>
where
    S: HistoryStore + 'static,
{
    pub fn new(service: Arc<IntervalTimerService<S>>) -> Self {
        Self {
            service,
            ticker: Mutex::new(None),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: TickListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn service(&self) -> &Arc<IntervalTimerService<S>> {
        &self.service
    }

    fn lock_ticker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.lock_ticker()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(&self) -> Result<TimerSnapshot, TransitionRejection> {
        let now = self.service.now();
        let token = self.service.start(now)?;
        self.spawn_ticker(token);
        Ok(self.service.snapshot(now))
    }

    /// Cancels the tick task, then resets the timer.
    pub fn stop(&self) -> Result<TimerSnapshot, TransitionRejection> {
        self.cancel_ticker();
        let result = self.service.stop();
        let snapshot = self.service.snapshot(self.service.now());
        result.map(|()| snapshot)
    }

    fn spawn_ticker(&self, token: RunToken) {
        let mut ticker_guard = self.lock_ticker();
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let service = Arc::clone(&self.service);
        let listener = self.listener.clone();
        let period = service.config().poll_interval();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                let now = service.now();
                let outcome = service.advance_run(token, now);
                if outcome == TickOutcome::Idle {
                    break;
                }

                if let Some(listener) = listener.as_ref() {
                    listener(TickReport {
                        outcome,
                        snapshot: service.snapshot(now),
                    });
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    fn cancel_ticker(&self) {
        if let Some(handle) = self.lock_ticker().take() {
            handle.abort();
        }
    }
}

impl<S> Drop for TickDriver<S>
where
    S: HistoryStore + 'static,
{
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}
