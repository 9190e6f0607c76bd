//! Calendar-day math in an explicit time zone.
//!
//! Every "today" and "N days ago" in the crate goes through these functions so
//! that day boundaries follow the configured zone instead of the host clock.

use chrono::{DateTime, Days, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// First instant of `date` in `tz`, as UTC.
///
/// Zones that skip midnight on a DST change start the day at the first local
/// time that exists.
pub fn day_start(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    for offset_minutes in (0..=24 * 60).step_by(15) {
        let candidate = midnight + Duration::minutes(offset_minutes);
        if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
            return resolved.with_timezone(&Utc);
        }
    }
    // No zone has a full-day gap; fall back to interpreting midnight as UTC.
    Utc.from_utc_datetime(&midnight)
}

pub fn start_of_day(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    day_start(local_date(instant, tz), tz)
}

/// Start of the local day `days` calendar days before the day containing `instant`.
pub fn start_of_day_days_ago(instant: DateTime<Utc>, tz: Tz, days: u32) -> DateTime<Utc> {
    let today = local_date(instant, tz);
    let date = today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    day_start(date, tz)
}
