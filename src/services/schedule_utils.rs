use chrono::{
    DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeZone, Timelike,
};
use chrono_tz::Tz;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::constraints::{PeriodConfig, PeriodUnit, PeriodWindow};

/// Length of the window before a period that feeds the continuity check.
pub const PREVIOUS_PERIOD_WEEKS: i64 = 4;

const DAYS_PER_WEEK: i64 = 7;

pub fn parse_datetime(value: &str) -> AppResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).map_err(|err| {
        AppError::validation_with_details(
            "invalid timestamp format",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub fn format_datetime(dt: DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

/// Builds an absolute timestamp from a calendar date (`YYYY-MM-DD`) and a
/// time of day (`HH:MM`) read in `tz`.
pub fn parse_local_datetime(date: &str, time: &str, tz: Tz) -> AppResult<DateTime<FixedOffset>> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|err| {
        AppError::validation_with_details(
            "invalid date format",
            json!({"value": date, "error": err.to_string()}),
        )
    })?;
    let clock = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|err| {
            AppError::validation_with_details(
                "invalid time of day",
                json!({"value": time, "error": err.to_string()}),
            )
        })?;

    let local = tz
        .from_local_datetime(&day.and_time(clock))
        .earliest()
        .ok_or_else(|| {
            AppError::validation_with_details(
                "local time does not exist in time zone",
                json!({"date": date, "time": time, "timezone": tz.name()}),
            )
        })?;
    Ok(local.with_timezone(&local.offset().fix()))
}

/// Inclusive overlap: ranges that only touch at an edge still overlap.
pub fn overlaps(
    a_start: DateTime<FixedOffset>,
    a_end: DateTime<FixedOffset>,
    b_start: DateTime<FixedOffset>,
    b_end: DateTime<FixedOffset>,
) -> bool {
    a_start <= b_end && a_end >= b_start
}

pub fn ensure_window(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> AppResult<()> {
    if end <= start {
        Err(AppError::validation_with_details(
            "window end must be after its start",
            json!({"start": format_datetime(start), "end": format_datetime(end)}),
        ))
    } else {
        Ok(())
    }
}

pub fn add_minutes(dt: DateTime<FixedOffset>, minutes: i64) -> AppResult<DateTime<FixedOffset>> {
    dt.checked_add_signed(Duration::minutes(minutes))
        .ok_or_else(|| AppError::validation("time arithmetic out of range"))
}

pub fn duration_hours(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> f64 {
    end.signed_duration_since(start).num_seconds() as f64 / 3600.0
}

/// Zero-based number of whole 7-day blocks between `period_start` and
/// `timestamp`. Floors toward negative infinity for timestamps before the start.
pub fn week_index_of(timestamp: DateTime<FixedOffset>, period_start: DateTime<FixedOffset>) -> i64 {
    let seconds = timestamp.signed_duration_since(period_start).num_seconds();
    seconds.div_euclid(DAYS_PER_WEEK * 24 * 3600)
}

pub fn resolve_period(
    start: DateTime<FixedOffset>,
    config: &PeriodConfig,
) -> AppResult<PeriodWindow> {
    if config.duration == 0 {
        return Err(AppError::validation("period duration must be at least 1"));
    }

    let end = match config.unit {
        PeriodUnit::Weeks => {
            start.checked_add_signed(Duration::days(DAYS_PER_WEEK * i64::from(config.duration)))
        }
        PeriodUnit::Months => start.checked_add_months(Months::new(config.duration)),
    }
    .ok_or_else(|| AppError::validation("period end out of range"))?;

    Ok(PeriodWindow {
        start_at: start,
        end_at: end,
    })
}

pub fn previous_period_start(period_start: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    period_start - Duration::days(DAYS_PER_WEEK * PREVIOUS_PERIOD_WEEKS)
}

pub fn hour_in(timestamp: DateTime<FixedOffset>, tz: Tz) -> u32 {
    timestamp.with_timezone(&tz).hour()
}
