use chrono::{DateTime, Datelike, Days, Duration, Local, LocalResult, NaiveDateTime, TimeZone};

use crate::alarm::model::Alarm;

pub const DEFAULT_LOOKAHEAD_SECS: i64 = 30;

// Two weeks so a time lost to a DST gap on the only armed weekday still
// lands on the following week.
const SCAN_DAYS: u64 = 14;

pub fn default_lookahead() -> Duration {
    Duration::seconds(DEFAULT_LOOKAHEAD_SECS)
}

fn resolve_local_datetime<Tz>(timezone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _second) => Some(first),
        LocalResult::None => None,
    }
}

pub fn next_occurrence(
    alarm: &Alarm,
    now: &DateTime<Local>,
    lookahead: Duration,
) -> Option<DateTime<Local>> {
    next_occurrence_in_tz(alarm, now, &Local, lookahead)
}

/// Next instant strictly after `now + lookahead` at which `alarm` is due,
/// evaluated on the wall clock of `timezone` (the same zone as `now`).
///
/// Returns `None` for inactive alarms, alarms with no armed weekday, and
/// alarms whose stored time is not a valid time of day.
pub fn next_occurrence_in_tz<Tz>(
    alarm: &Alarm,
    now: &DateTime<Tz>,
    timezone: &Tz,
    lookahead: Duration,
) -> Option<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    if !alarm.is_active || alarm.days.is_empty() {
        return None;
    }
    let time_local = alarm.time_24h()?;
    let threshold = *now + lookahead;

    // Offset 0 is today; the rest walk forward one local date at a time.
    for day_offset in 0..=SCAN_DAYS {
        let date = now.date_naive().checked_add_days(Days::new(day_offset))?;
        if !alarm.days.contains(date.weekday()) {
            continue;
        }
        let candidate = match resolve_local_datetime(timezone, date.and_time(time_local)) {
            Some(value) => value,
            None => continue,
        };

        if candidate > threshold {
            return Some(candidate);
        }
    }

    None
}
