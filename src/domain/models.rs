use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Work,
    Break,
    LongBreak,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Break => "break",
            Self::LongBreak => "long_break",
        }
    }

    pub fn is_work(self) -> bool {
        self == Self::Work
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moment a Work phase completed, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct HistoryEntry(pub i64);

impl HistoryEntry {
    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value.timestamp_millis())
    }

    pub fn timestamp_millis(self) -> i64 {
        self.0
    }

    pub fn as_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
    }

    pub fn is_at_or_after(self, instant: DateTime<Utc>) -> bool {
        self.0 >= instant.timestamp_millis()
    }

    pub fn is_within(self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.0 >= start.timestamp_millis() && self.0 < end.timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseWindow {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl PhaseWindow {
    pub fn starting_at(start_at: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start_at,
            end_at: start_at + length,
        }
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        self.end_at - now
    }
}

/// Live timer state. `window` is `None` exactly when the timer is stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IntervalState {
    pub phase: Phase,
    pub window: Option<PhaseWindow>,
    pub completed_work_cycles_today: u32,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl IntervalState {
    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.window.is_some()
    }

    pub fn start_at(&self) -> Option<DateTime<Utc>> {
        self.window.map(|window| window.start_at)
    }

    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        self.window.map(|window| window.end_at)
    }

    pub fn validate(&self, config: &TimerConfig) -> Result<(), String> {
        let Some(window) = self.window else {
            if self.phase != Phase::Work {
                return Err("interval.phase must be work while stopped".to_string());
            }
            return Ok(());
        };
        if window.end_at <= window.start_at {
            return Err("interval.end_at must be after interval.start_at".to_string());
        }
        if window.end_at - window.start_at != config.duration_of(self.phase) {
            return Err(format!(
                "interval window must match the configured {} duration",
                self.phase
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RemainingDisplay {
    pub minutes: i64,
    pub seconds: u8,
}

impl RemainingDisplay {
    pub fn from_duration(remaining: Duration) -> Self {
        let total_ms = remaining.num_milliseconds().max(0);
        Self {
            minutes: total_ms / 60_000,
            seconds: ((total_ms % 60_000) / 1_000) as u8,
        }
    }
}

impl fmt::Display for RemainingDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TodaySummary {
    pub count: u32,
    pub goal: u32,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyBucket {
    pub day_start: DateTime<Utc>,
    pub label: String,
    pub count: u32,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    pub work_duration_seconds: u32,
    pub break_duration_seconds: u32,
    pub long_break_duration_seconds: u32,
    pub daily_goal_cycles: u32,
    pub history_retention_days: u32,
    pub long_break_every_n_cycles: u32,
    pub poll_interval_ms: u64,
    pub timezone: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_duration_seconds: 25 * 60,
            break_duration_seconds: 5 * 60,
            long_break_duration_seconds: 15 * 60,
            daily_goal_cycles: 4,
            history_retention_days: 7,
            long_break_every_n_cycles: 4,
            poll_interval_ms: 500,
            timezone: "UTC".to_string(),
        }
    }
}

impl TimerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.work_duration_seconds == 0 {
            return Err("timer.work_duration_seconds must be > 0".to_string());
        }
        if self.break_duration_seconds == 0 {
            return Err("timer.break_duration_seconds must be > 0".to_string());
        }
        if self.long_break_duration_seconds == 0 {
            return Err("timer.long_break_duration_seconds must be > 0".to_string());
        }
        if self.daily_goal_cycles == 0 {
            return Err("timer.daily_goal_cycles must be > 0".to_string());
        }
        if self.history_retention_days == 0 {
            return Err("timer.history_retention_days must be > 0".to_string());
        }
        if self.long_break_every_n_cycles == 0 {
            return Err("timer.long_break_every_n_cycles must be > 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("timer.poll_interval_ms must be > 0".to_string());
        }
        self.time_zone()?;
        Ok(())
    }

    pub fn duration_of(&self, phase: Phase) -> Duration {
        let seconds = match phase {
            Phase::Work => self.work_duration_seconds,
            Phase::Break => self.break_duration_seconds,
            Phase::LongBreak => self.long_break_duration_seconds,
        };
        Duration::seconds(i64::from(seconds))
    }

    pub fn time_zone(&self) -> Result<Tz, String> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| format!("timer.timezone '{}' is not a known IANA zone", self.timezone))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    /// Long breaks only follow a positive multiple of the configured period.
    pub fn is_long_break_due(&self, completed_today: u32) -> bool {
        completed_today > 0 && completed_today % self.long_break_every_n_cycles.max(1) == 0
    }

    pub fn percent_of_goal(&self, count: u32) -> f64 {
        f64::from(count) / f64::from(self.daily_goal_cycles.max(1)) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn running_state(config: &TimerConfig) -> IntervalState {
        IntervalState {
            phase: Phase::Work,
            window: Some(PhaseWindow::starting_at(
                fixed_time("2026-02-16T09:00:00Z"),
                config.duration_of(Phase::Work),
            )),
            completed_work_cycles_today: 0,
            last_seen_at: Some(fixed_time("2026-02-16T09:00:00Z")),
        }
    }

    #[test]
    fn default_config_uses_nominal_durations() {
        let config = TimerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.duration_of(Phase::Work), Duration::minutes(25));
        assert_eq!(config.duration_of(Phase::Break), Duration::minutes(5));
        assert_eq!(config.duration_of(Phase::LongBreak), Duration::minutes(15));
    }

    #[test]
    fn config_validate_rejects_zero_values_and_unknown_zone() {
        let mut config = TimerConfig::default();
        config.break_duration_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = TimerConfig::default();
        config.long_break_every_n_cycles = 0;
        assert!(config.validate().is_err());

        let mut config = TimerConfig::default();
        config.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());

        let mut config = TimerConfig::default();
        config.timezone = "Asia/Tokyo".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn long_break_is_never_due_for_zero_cycles() {
        let config = TimerConfig::default();
        assert!(!config.is_long_break_due(0));
        assert!(!config.is_long_break_due(1));
        assert!(!config.is_long_break_due(3));
        assert!(config.is_long_break_due(4));
        assert!(!config.is_long_break_due(6));
        assert!(config.is_long_break_due(8));
    }

    #[test]
    fn percent_of_goal_is_not_clamped() {
        let config = TimerConfig::default();
        assert_eq!(config.percent_of_goal(1), 25.0);
        assert_eq!(config.percent_of_goal(4), 100.0);
        assert_eq!(config.percent_of_goal(6), 150.0);
    }

    #[test]
    fn interval_state_validate_checks_window() {
        let config = TimerConfig::default();
        assert!(IntervalState::stopped().validate(&config).is_ok());
        assert!(running_state(&config).validate(&config).is_ok());

        let mut state = running_state(&config);
        state.phase = Phase::Break;
        assert!(state.validate(&config).is_err());

        let mut state = running_state(&config);
        let start = fixed_time("2026-02-16T09:00:00Z");
        state.window = Some(PhaseWindow {
            start_at: start,
            end_at: start,
        });
        assert!(state.validate(&config).is_err());
    }

    #[test]
    fn remaining_display_pads_seconds_and_clamps_negative() {
        let display = RemainingDisplay::from_duration(Duration::milliseconds(4 * 60_000 + 5_900));
        assert_eq!(display.minutes, 4);
        assert_eq!(display.seconds, 5);
        assert_eq!(display.to_string(), "4:05");

        let expired = RemainingDisplay::from_duration(Duration::milliseconds(-1_500));
        assert_eq!(expired.to_string(), "0:00");
    }

    #[test]
    fn history_entry_range_checks_are_half_open() {
        let start = fixed_time("2026-02-16T00:00:00Z");
        let end = fixed_time("2026-02-17T00:00:00Z");
        assert!(HistoryEntry::from_datetime(start).is_within(start, end));
        assert!(!HistoryEntry::from_datetime(end).is_within(start, end));
        assert!(HistoryEntry::from_datetime(start).is_at_or_after(start));
    }

    // Feature: pomocycle, Property 3: long break iff positive multiple of the period
    proptest! {
        #[test]
        fn property3_long_break_iff_positive_multiple(
            count in 0u32..500u32,
            period in 1u32..12u32
        ) {
            let config = TimerConfig {
                long_break_every_n_cycles: period,
                ..TimerConfig::default()
            };
            let expected = count > 0 && count % period == 0;
            prop_assert_eq!(config.is_long_break_due(count), expected);
        }
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let config = TimerConfig::default();
        let state = running_state(&config);
        let entries = vec![HistoryEntry(1_771_232_400_000), HistoryEntry(1_771_233_960_000)];

        let config_roundtrip: TimerConfig =
            serde_json::from_str(&serde_json::to_string(&config).expect("serialize config"))
                .expect("deserialize config");
        let state_roundtrip: IntervalState =
            serde_json::from_str(&serde_json::to_string(&state).expect("serialize state"))
                .expect("deserialize state");
        let raw_entries = serde_json::to_string(&entries).expect("serialize entries");

        assert_eq!(config_roundtrip, config);
        assert_eq!(state_roundtrip, state);
        assert_eq!(raw_entries, "[1771232400000,1771233960000]");
    }
}
