use crate::application::bootstrap::bootstrap_workspace;
use crate::application::ticker::{TickDriver, TickListener};
use crate::application::timer_service::{IntervalTimerService, TimerSnapshot};
use crate::domain::interval_machine::TransitionRejection;
use crate::infrastructure::clock::{system_now_provider, NowProvider};
use crate::infrastructure::config::load_timer_config;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::history_store::SqliteHistoryStore;
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    driver: TickDriver<SqliteHistoryStore>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_options(workspace_root, system_now_provider(), None)
    }

    pub fn with_options(
        workspace_root: PathBuf,
        now_provider: NowProvider,
        tick_listener: Option<TickListener>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = load_timer_config(&bootstrap.config_dir)?;
        let store = Arc::new(SqliteHistoryStore::new(&bootstrap.database_path));
        let service = IntervalTimerService::new(config, store)?.with_now_provider(now_provider);

        let mut driver = TickDriver::new(Arc::new(service));
        if let Some(listener) = tick_listener {
            driver = driver.with_listener(listener);
        }

        Ok(Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            driver,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerStateResponse {
    pub phase: String,
    pub running: bool,
    pub remaining: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub completed_work_cycles_today: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TodaySummaryResponse {
    pub count: u32,
    pub goal: u32,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyBucketResponse {
    pub date: String,
    pub day_start: String,
    pub count: u32,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeeklyHistoryResponse {
    pub buckets: Vec<DailyBucketResponse>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PruneHistoryResponse {
    pub cutoff: String,
    pub kept: usize,
    pub removed: usize,
}

pub fn start_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    match state.driver.start() {
        Ok(snapshot) => {
            state.log_info(
                "start_timer",
                &format!(
                    "started work phase ending at {}",
                    snapshot
                        .end_at
                        .map(|value| value.to_rfc3339())
                        .unwrap_or_default()
                ),
            );
            Ok(to_timer_state_response(&snapshot))
        }
        Err(rejection) => Ok(ignored(state, "start_timer", rejection)),
    }
}

pub fn stop_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    match state.driver.stop() {
        Ok(snapshot) => {
            state.log_info("stop_timer", "stopped timer");
            Ok(to_timer_state_response(&snapshot))
        }
        Err(rejection) => Ok(ignored(state, "stop_timer", rejection)),
    }
}

pub fn get_timer_state_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let service = state.driver.service();
    Ok(to_timer_state_response(&service.snapshot(service.now())))
}

pub fn get_today_summary_impl(state: &AppState) -> Result<TodaySummaryResponse, InfraError> {
    let service = state.driver.service();
    let summary = service.count_today(service.now())?;
    Ok(TodaySummaryResponse {
        count: summary.count,
        goal: summary.goal,
        percent: summary.percent,
    })
}

pub fn get_weekly_history_impl(state: &AppState) -> Result<WeeklyHistoryResponse, InfraError> {
    let service = state.driver.service();
    let buckets = service
        .weekly_buckets(service.now())?
        .into_iter()
        .map(|bucket| DailyBucketResponse {
            date: bucket.label,
            day_start: bucket.day_start.to_rfc3339(),
            count: bucket.count,
            percent: bucket.percent,
        })
        .collect();
    Ok(WeeklyHistoryResponse { buckets })
}

pub fn prune_history_impl(state: &AppState) -> Result<PruneHistoryResponse, InfraError> {
    let service = state.driver.service();
    let report = service.prune_history(service.now())?;
    state.log_info(
        "prune_history",
        &format!(
            "kept={} removed={} cutoff={}",
            report.kept,
            report.removed,
            report.cutoff.to_rfc3339()
        ),
    );
    Ok(PruneHistoryResponse {
        cutoff: report.cutoff.to_rfc3339(),
        kept: report.kept,
        removed: report.removed,
    })
}

fn ignored(state: &AppState, command: &str, rejection: TransitionRejection) -> TimerStateResponse {
    state.log_info(command, &format!("ignored: {rejection}"));
    let service = state.driver.service();
    to_timer_state_response(&service.snapshot(service.now()))
}

fn to_timer_state_response(snapshot: &TimerSnapshot) -> TimerStateResponse {
    TimerStateResponse {
        phase: snapshot.phase.as_str().to_string(),
        running: snapshot.running,
        remaining: snapshot.remaining.to_string(),
        start_time: snapshot.start_at.map(|value| value.to_rfc3339()),
        end_time: snapshot.end_at.map(|value| value.to_rfc3339()),
        completed_work_cycles_today: snapshot.completed_work_cycles_today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::history_store::HistoryStore;
    use crate::domain::models::HistoryEntry;
    use chrono::{DateTime, Duration};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "pomocycle-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self, clock: &ManualClock) -> AppState {
            AppState::with_options(self.path.clone(), clock.provider(), None)
                .expect("initialize app state")
        }

        fn history(&self) -> SqliteHistoryStore {
            SqliteHistoryStore::new(self.path.join("state").join("pomocycle.sqlite"))
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn app_state_bootstraps_workspace() {
        let workspace = TempWorkspace::new();
        let clock = ManualClock::new(fixed_time("2026-02-16T09:00:00Z"));
        let state = workspace.app_state(&clock);

        assert!(state.config_dir().join("timer.json").exists());
        assert!(state.config_dir().join("app.json").exists());
        assert!(state.database_path().exists());
    }

    #[test]
    fn stopped_timer_shows_full_work_duration() {
        let workspace = TempWorkspace::new();
        let clock = ManualClock::new(fixed_time("2026-02-16T09:00:00Z"));
        let state = workspace.app_state(&clock);

        let snapshot = get_timer_state_impl(&state).expect("timer state");
        assert_eq!(snapshot.phase, "work");
        assert!(!snapshot.running);
        assert_eq!(snapshot.remaining, "25:00");
        assert_eq!(snapshot.start_time, None);
    }

    #[tokio::test]
    async fn start_and_stop_flow_writes_command_log() {
        let workspace = TempWorkspace::new();
        let clock = ManualClock::new(fixed_time("2026-02-16T09:00:00Z"));
        let state = workspace.app_state(&clock);

        let started = start_timer_impl(&state).expect("start timer");
        assert!(started.running);
        assert_eq!(
            started.end_time,
            Some(fixed_time("2026-02-16T09:25:00Z").to_rfc3339())
        );

        let again = start_timer_impl(&state).expect("second start is ignored");
        assert_eq!(again.end_time, started.end_time);

        let stopped = stop_timer_impl(&state).expect("stop timer");
        assert!(!stopped.running);
        assert_eq!(stopped.remaining, "25:00");

        let log = fs::read_to_string(workspace.path.join("logs").join("commands.log"))
            .expect("read command log");
        assert!(log.contains("\"command\":\"start_timer\""));
        assert!(log.contains("ignored: timer is already running"));
        assert!(log.contains("\"command\":\"stop_timer\""));
    }

    #[test]
    fn summaries_read_persisted_history() {
        let workspace = TempWorkspace::new();
        let clock = ManualClock::new(fixed_time("2026-02-16T12:00:00Z"));
        let state = workspace.app_state(&clock);
        workspace
            .history()
            .write_all(&[
                HistoryEntry::from_datetime(fixed_time("2026-02-01T10:00:00Z")),
                HistoryEntry::from_datetime(fixed_time("2026-02-14T10:00:00Z")),
                HistoryEntry::from_datetime(fixed_time("2026-02-16T09:26:00Z")),
            ])
            .expect("seed history");

        let today = get_today_summary_impl(&state).expect("today summary");
        assert_eq!(today.count, 1);
        assert_eq!(today.percent, 25.0);

        let weekly = get_weekly_history_impl(&state).expect("weekly history");
        assert_eq!(weekly.buckets.len(), 7);
        assert_eq!(weekly.buckets[5].date, "02/14");
        assert_eq!(weekly.buckets[5].count, 1);

        let pruned = prune_history_impl(&state).expect("prune history");
        assert_eq!(pruned.removed, 1);
        assert_eq!(pruned.kept, 2);
        assert_eq!(workspace.history().read_all().expect("read history").len(), 2);
    }

    #[tokio::test]
    async fn clock_driven_completion_is_persisted() {
        let workspace = TempWorkspace::new();
        fs::create_dir_all(workspace.path.join("config")).expect("create config dir");
        fs::write(
            workspace.path.join("config").join("timer.json"),
            r#"{"schema":1,"workDurationSeconds":30,"breakDurationSeconds":18,"longBreakDurationSeconds":60,"pollIntervalMs":5}"#,
        )
        .expect("seed timer config");
        let clock = ManualClock::new(fixed_time("2026-02-16T09:00:00Z"));
        let state = workspace.app_state(&clock);

        start_timer_impl(&state).expect("start timer");
        clock.advance(Duration::seconds(31));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let snapshot = get_timer_state_impl(&state).expect("timer state");
        assert_eq!(snapshot.phase, "break");
        assert_eq!(snapshot.completed_work_cycles_today, 1);
        assert_eq!(get_today_summary_impl(&state).expect("today").count, 1);

        stop_timer_impl(&state).expect("stop timer");
    }
}
