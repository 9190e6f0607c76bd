pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    get_today_summary_impl, get_weekly_history_impl, prune_history_impl, start_timer_impl,
    stop_timer_impl, AppState,
};
use application::ticker::{TickListener, TickReport};
use domain::interval_machine::TickOutcome;
use infrastructure::clock::system_now_provider;
use infrastructure::error::InfraError;
use std::sync::Arc;

pub use application::timer_service::{IntervalTimerService, TimerSnapshot};
pub use domain::models::{DailyBucket, HistoryEntry, Phase, TimerConfig, TodaySummary};
pub use infrastructure::history_store::{HistoryStore, InMemoryHistoryStore, SqliteHistoryStore};

fn render_tick(report: &TickReport) -> String {
    let snapshot = &report.snapshot;
    let line = format!(
        "{} {} | today {}/{}",
        snapshot.remaining, snapshot.phase, snapshot.completed_work_cycles_today, snapshot.daily_goal_cycles
    );
    match report.outcome {
        TickOutcome::Transitioned(change) => format!("{line} | {} -> {}", change.from, change.to),
        _ => line,
    }
}

fn print_history(state: &AppState) -> Result<(), InfraError> {
    let today = get_today_summary_impl(state)?;
    println!("today: {}/{} ({}%)", today.count, today.goal, today.percent);
    for bucket in get_weekly_history_impl(state)?.buckets {
        println!("  {}: {} ({}%)", bucket.date, bucket.count, bucket.percent);
    }
    Ok(())
}

/// Runs the timer in the current directory until Ctrl-C.
pub async fn run() -> Result<(), InfraError> {
    let workspace_root = std::env::current_dir()?;
    let listener: TickListener = Arc::new(|report: TickReport| {
        println!("{}", render_tick(&report));
    });
    let state = AppState::with_options(workspace_root, system_now_provider(), Some(listener))?;

    prune_history_impl(&state).inspect_err(|error| {
        state.command_error("prune_history", error);
    })?;
    print_history(&state)?;

    start_timer_impl(&state).inspect_err(|error| {
        state.command_error("start_timer", error);
    })?;
    tokio::signal::ctrl_c().await?;
    stop_timer_impl(&state).inspect_err(|error| {
        state.command_error("stop_timer", error);
    })?;

    print_history(&state)
}
