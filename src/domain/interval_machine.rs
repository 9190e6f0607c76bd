//! Pure transition functions for the work/break cycle.
//!
//! Each function takes the current [`IntervalState`] by value and returns the
//! next one together with an outcome describing what happened. Persistence is
//! reached only through the `record_completion` callback of [`advance`].

use crate::domain::models::{IntervalState, Phase, PhaseWindow, RemainingDisplay, TimerConfig};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

/// Requests that were ignored without changing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransitionRejection {
    #[error("timer is already running")]
    AlreadyRunning,
    #[error("timer is not running")]
    NotRunning,
    #[error("clock moved backwards from {last_seen_at} to {now}")]
    ClockRegression {
        last_seen_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
    pub at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub completed_today: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TickOutcome {
    Idle,
    Counting { remaining_ms: i64 },
    Transitioned(PhaseChange),
    /// Completion could not be recorded; the phase stays expired and the next tick retries.
    RecordFailed,
    Ignored(TransitionRejection),
}

pub fn start(
    state: IntervalState,
    now: DateTime<Utc>,
    config: &TimerConfig,
) -> (IntervalState, Result<(), TransitionRejection>) {
    if state.is_running() {
        return (state, Err(TransitionRejection::AlreadyRunning));
    }

    let next = IntervalState {
        phase: Phase::Work,
        window: Some(PhaseWindow::starting_at(now, config.duration_of(Phase::Work))),
        completed_work_cycles_today: state.completed_work_cycles_today,
        last_seen_at: Some(now),
    };
    (next, Ok(()))
}

pub fn stop(state: IntervalState) -> (IntervalState, Result<(), TransitionRejection>) {
    let was_running = state.is_running();
    let next = IntervalState {
        completed_work_cycles_today: state.completed_work_cycles_today,
        ..IntervalState::stopped()
    };
    if was_running {
        (next, Ok(()))
    } else {
        (next, Err(TransitionRejection::NotRunning))
    }
}

/// Moves the timer forward to `now`.
///
/// At most one transition fires per call: the new phase window is anchored at
/// `now`, so it always has positive remaining time. When a Work phase ends,
/// `record_completion(now)` must persist the completion and return the number
/// of cycles completed today including this one, or `None` if recording failed.
pub fn advance<F>(
    state: IntervalState,
    now: DateTime<Utc>,
    config: &TimerConfig,
    record_completion: F,
) -> (IntervalState, TickOutcome)
where
    F: FnOnce(DateTime<Utc>) -> Option<u32>,
{
    let Some(window) = state.window else {
        return (state, TickOutcome::Idle);
    };

    if let Some(last_seen_at) = state.last_seen_at {
        if now < last_seen_at {
            return (
                state,
                TickOutcome::Ignored(TransitionRejection::ClockRegression { last_seen_at, now }),
            );
        }
    }

    let remaining = window.remaining_at(now);
    if remaining > Duration::zero() {
        let next = IntervalState {
            last_seen_at: Some(now),
            ..state
        };
        return (
            next,
            TickOutcome::Counting {
                remaining_ms: remaining.num_milliseconds(),
            },
        );
    }

    let from = state.phase;
    let (to, completed_today) = if from.is_work() {
        let Some(completed_today) = record_completion(now) else {
            return (state, TickOutcome::RecordFailed);
        };
        let to = if config.is_long_break_due(completed_today) {
            Phase::LongBreak
        } else {
            Phase::Break
        };
        (to, completed_today)
    } else {
        (Phase::Work, state.completed_work_cycles_today)
    };

    let next_window = PhaseWindow::starting_at(now, config.duration_of(to));
    let next = IntervalState {
        phase: to,
        window: Some(next_window),
        completed_work_cycles_today: completed_today,
        last_seen_at: Some(now),
    };
    let change = PhaseChange {
        from,
        to,
        at: now,
        ends_at: next_window.end_at,
        completed_today,
    };
    (next, TickOutcome::Transitioned(change))
}

pub fn remaining_display(
    state: &IntervalState,
    now: DateTime<Utc>,
    config: &TimerConfig,
) -> RemainingDisplay {
    match state.window {
        Some(window) => RemainingDisplay::from_duration(window.remaining_at(now)),
        None => RemainingDisplay::from_duration(config.duration_of(Phase::Work)),
    }
}
