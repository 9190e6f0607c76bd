use crate::domain::history_stats::{count_today, weekly_buckets};
use crate::domain::interval_machine::{self, TickOutcome, TransitionRejection};
use crate::domain::models::{
    DailyBucket, HistoryEntry, IntervalState, Phase, RemainingDisplay, TimerConfig, TodaySummary,
};
use crate::domain::retention::{prune, PruneReport};
use crate::infrastructure::clock::{system_now_provider, NowProvider};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::history_store::HistoryStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Identifies one start..stop run of the timer. Ticks carrying the token of an
/// earlier run are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken(u64);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub running: bool,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub remaining: RemainingDisplay,
    pub completed_work_cycles_today: u32,
    pub daily_goal_cycles: u32,
}

#[derive(Debug)]
struct ServiceState {
    interval: IntervalState,
    run: u64,
}

pub struct IntervalTimerService<S>
where
    S: HistoryStore,
{
    config: TimerConfig,
    time_zone: Tz,
    store: Arc<S>,
    now_provider: NowProvider,
    state: Mutex<ServiceState>,
}

impl<S> IntervalTimerService<S>
where
    S: HistoryStore,
{
    pub fn new(config: TimerConfig, store: Arc<S>) -> Result<Self, InfraError> {
        config.validate().map_err(InfraError::InvalidConfig)?;
        let time_zone = config.time_zone().map_err(InfraError::InvalidConfig)?;
        Ok(Self {
            config,
            time_zone,
            store,
            now_provider: system_now_provider(),
            state: Mutex::new(ServiceState {
                interval: IntervalState::stopped(),
                run: 0,
            }),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn lock_state(&self) -> MutexGuard<'_, ServiceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("timer state lock poisoned; continuing with last written state");
                poisoned.into_inner()
            }
        }
    }

    pub fn state(&self) -> IntervalState {
        self.lock_state().interval.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().interval.is_running()
    }

    pub fn start(&self, now: DateTime<Utc>) -> Result<RunToken, TransitionRejection> {
        let mut guard = self.lock_state();
        let mut current = guard.interval.clone();
        if !current.is_running() {
            current.completed_work_cycles_today = self.completed_today_or(now, 0);
        }

        let (next, result) = interval_machine::start(current, now, &self.config);
        if let Err(rejection) = result {
            log::info!("start ignored: {rejection}");
            return Err(rejection);
        }

        guard.run = guard.run.wrapping_add(1);
        guard.interval = next;
        log::info!(
            "timer started at {now}, work ends at {}",
            guard
                .interval
                .end_at()
                .map(|value| value.to_rfc3339())
                .unwrap_or_default()
        );
        Ok(RunToken(guard.run))
    }

    /// Resets to stopped. Any tick still in flight for the previous run becomes a no-op.
    pub fn stop(&self) -> Result<(), TransitionRejection> {
        let mut guard = self.lock_state();
        guard.run = guard.run.wrapping_add(1);
        let (next, result) = interval_machine::stop(guard.interval.clone());
        guard.interval = next;
        match result {
            Ok(()) => log::info!("timer stopped"),
            Err(rejection) => log::debug!("stop ignored: {rejection}"),
        }
        result
    }

    pub fn current_run(&self) -> Option<RunToken> {
        let guard = self.lock_state();
        guard.interval.is_running().then_some(RunToken(guard.run))
    }

    /// Advances the current run, whatever it is.
    pub fn advance(&self, now: DateTime<Utc>) -> TickOutcome {
        let mut guard = self.lock_state();
        self.advance_locked(&mut guard, now)
    }

    /// Advances only if `token` still names the current run.
    pub fn advance_run(&self, token: RunToken, now: DateTime<Utc>) -> TickOutcome {
        let mut guard = self.lock_state();
        if guard.run != token.0 {
            return TickOutcome::Idle;
        }
        self.advance_locked(&mut guard, now)
    }

    fn advance_locked(&self, guard: &mut ServiceState, now: DateTime<Utc>) -> TickOutcome {
        let previous_count = guard.interval.completed_work_cycles_today;
        let (next, outcome) =
            interval_machine::advance(guard.interval.clone(), now, &self.config, |completed_at| {
                self.record_completion(completed_at, previous_count)
            });
        guard.interval = next;

        match outcome {
            TickOutcome::Transitioned(change) => log::info!(
                "phase {} -> {} at {}, {} cycle(s) today, next change at {}",
                change.from,
                change.to,
                change.at.to_rfc3339(),
                change.completed_today,
                change.ends_at.to_rfc3339()
            ),
            TickOutcome::Ignored(rejection) => log::warn!("tick ignored: {rejection}"),
            TickOutcome::RecordFailed => {
                log::warn!("work completion not recorded; retrying on next tick")
            }
            TickOutcome::Idle | TickOutcome::Counting { .. } => {}
        }
        outcome
    }

    fn record_completion(&self, completed_at: DateTime<Utc>, previous_count: u32) -> Option<u32> {
        if let Err(error) = self.store.append(HistoryEntry::from_datetime(completed_at)) {
            log::error!("failed to record work completion: {error}");
            return None;
        }
        Some(self.completed_today_or(completed_at, previous_count.saturating_add(1)))
    }

    fn completed_today_or(&self, now: DateTime<Utc>, fallback: u32) -> u32 {
        match self.store.read_all() {
            Ok(history) => count_today(&history, now, self.time_zone, &self.config).count,
            Err(error) => {
                log::error!("failed to read history: {error}");
                fallback
            }
        }
    }

    pub fn remaining_display(&self, now: DateTime<Utc>) -> RemainingDisplay {
        let guard = self.lock_state();
        interval_machine::remaining_display(&guard.interval, now, &self.config)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let guard = self.lock_state();
        let interval = &guard.interval;
        TimerSnapshot {
            phase: interval.phase,
            running: interval.is_running(),
            start_at: interval.start_at(),
            end_at: interval.end_at(),
            remaining: interval_machine::remaining_display(interval, now, &self.config),
            completed_work_cycles_today: interval.completed_work_cycles_today,
            daily_goal_cycles: self.config.daily_goal_cycles,
        }
    }

    pub fn count_today(&self, now: DateTime<Utc>) -> Result<TodaySummary, InfraError> {
        let history = self.store.read_all()?;
        Ok(count_today(&history, now, self.time_zone, &self.config))
    }

    pub fn weekly_buckets(&self, now: DateTime<Utc>) -> Result<Vec<DailyBucket>, InfraError> {
        let history = self.store.read_all()?;
        Ok(weekly_buckets(&history, now, self.time_zone, &self.config))
    }

    pub fn prune_history(&self, now: DateTime<Utc>) -> Result<PruneReport, InfraError> {
        let history = self.store.read_all()?;
        let (kept, report) = prune(
            history,
            now,
            self.time_zone,
            self.config.history_retention_days,
        );
        self.store.write_all(&kept)?;
        if report.removed > 0 {
            log::info!(
                "pruned {} history entries older than {}",
                report.removed,
                report.cutoff.to_rfc3339()
            );
        }
        Ok(report)
    }
}
