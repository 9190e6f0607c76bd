use crate::domain::models::TimerConfig;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const TIMER_JSON: &str = "timer.json";
const SUPPORTED_SCHEMA: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub timer: serde_json::Value,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    let defaults = TimerConfig::default();
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": SUPPORTED_SCHEMA,
                "appName": "pomocycle",
                "timezone": defaults.timezone,
            }),
        ),
        (
            TIMER_JSON,
            serde_json::json!({
                "schema": SUPPORTED_SCHEMA,
                "workDurationSeconds": defaults.work_duration_seconds,
                "breakDurationSeconds": defaults.break_duration_seconds,
                "longBreakDurationSeconds": defaults.long_break_duration_seconds,
                "dailyGoalCycles": defaults.daily_goal_cycles,
                "historyRetentionDays": defaults.history_retention_days,
                "longBreakEveryNCycles": defaults.long_break_every_n_cycles,
                "pollIntervalMs": defaults.poll_interval_ms,
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        timer: read_config(&config_dir.join(TIMER_JSON))?,
    })
}

pub fn read_timezone(config_dir: &Path) -> Result<Option<String>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

fn positive_u32(value: &serde_json::Value, key: &str) -> Option<u32> {
    value
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
}

/// Builds the timer configuration from `timer.json` and the zone in `app.json`.
///
/// Missing or non-positive fields keep their defaults; a missing file or an
/// unsupported schema is an error.
pub fn load_timer_config(config_dir: &Path) -> Result<TimerConfig, InfraError> {
    let parsed = read_config(&config_dir.join(TIMER_JSON))?;
    let mut config = TimerConfig::default();

    if let Some(value) = positive_u32(&parsed, "workDurationSeconds") {
        config.work_duration_seconds = value;
    }
    if let Some(value) = positive_u32(&parsed, "breakDurationSeconds") {
        config.break_duration_seconds = value;
    }
    if let Some(value) = positive_u32(&parsed, "longBreakDurationSeconds") {
        config.long_break_duration_seconds = value;
    }
    if let Some(value) = positive_u32(&parsed, "dailyGoalCycles") {
        config.daily_goal_cycles = value;
    }
    if let Some(value) = positive_u32(&parsed, "historyRetentionDays") {
        config.history_retention_days = value;
    }
    if let Some(value) = positive_u32(&parsed, "longBreakEveryNCycles") {
        config.long_break_every_n_cycles = value;
    }
    if let Some(value) = parsed
        .get("pollIntervalMs")
        .and_then(serde_json::Value::as_u64)
        .filter(|value| *value > 0)
    {
        config.poll_interval_ms = value;
    }
    if let Some(timezone) = read_timezone(config_dir)? {
        config.timezone = timezone;
    }

    config.validate().map_err(InfraError::InvalidConfig)?;
    Ok(config)
}
