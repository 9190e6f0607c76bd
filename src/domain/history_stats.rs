use crate::domain::day_boundary::{day_start, local_date, start_of_day};
use crate::domain::models::{DailyBucket, HistoryEntry, TimerConfig, TodaySummary};
use chrono::{DateTime, Days, Utc};
use chrono_tz::Tz;

pub const WEEK_BUCKETS: u32 = 7;
const BUCKET_LABEL_FORMAT: &str = "%m/%d";

/// Completions at or after the start of the local day containing `now`.
pub fn count_today(
    history: &[HistoryEntry],
    now: DateTime<Utc>,
    tz: Tz,
    config: &TimerConfig,
) -> TodaySummary {
    let today_start = start_of_day(now, tz);
    let count = history
        .iter()
        .filter(|entry| entry.is_at_or_after(today_start))
        .count() as u32;

    TodaySummary {
        count,
        goal: config.daily_goal_cycles,
        percent: config.percent_of_goal(count),
    }
}

/// One bucket per local day for the seven days before today, oldest first.
/// Today itself is never part of the window.
pub fn weekly_buckets(
    history: &[HistoryEntry],
    now: DateTime<Utc>,
    tz: Tz,
    config: &TimerConfig,
) -> Vec<DailyBucket> {
    let today = local_date(now, tz);

    (0..WEEK_BUCKETS)
        .filter_map(|offset| {
            let date = today.checked_sub_days(Days::new(u64::from(WEEK_BUCKETS - offset)))?;
            let next_date = date.checked_add_days(Days::new(1))?;
            let start = day_start(date, tz);
            let end = day_start(next_date, tz);
            let count = history
                .iter()
                .filter(|entry| entry.is_within(start, end))
                .count() as u32;

            Some(DailyBucket {
                day_start: start,
                label: date.format(BUCKET_LABEL_FORMAT).to_string(),
                count,
                percent: config.percent_of_goal(count),
            })
        })
        .collect()
}
