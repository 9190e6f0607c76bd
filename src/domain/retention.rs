use crate::domain::day_boundary::start_of_day_days_ago;
use crate::domain::models::HistoryEntry;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PruneReport {
    pub cutoff: DateTime<Utc>,
    pub kept: usize,
    pub removed: usize,
}

pub fn retention_cutoff(now: DateTime<Utc>, tz: Tz, retention_days: u32) -> DateTime<Utc> {
    start_of_day_days_ago(now, tz, retention_days)
}

/// Keeps entries at or after the start of the day `retention_days` days ago.
pub fn prune(
    entries: Vec<HistoryEntry>,
    now: DateTime<Utc>,
    tz: Tz,
    retention_days: u32,
) -> (Vec<HistoryEntry>, PruneReport) {
    let cutoff = retention_cutoff(now, tz, retention_days);
    let before = entries.len();
    let kept = entries
        .into_iter()
        .filter(|entry| entry.is_at_or_after(cutoff))
        .collect::<Vec<_>>();
    let report = PruneReport {
        cutoff,
        kept: kept.len(),
        removed: before - kept.len(),
    };
    (kept, report)
}
