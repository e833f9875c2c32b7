use std::convert::TryFrom;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::member::AvailabilityWindow;
use crate::services::schedule_utils;

#[derive(Debug, Clone)]
pub struct AvailabilityRow {
    pub id: i64,
    pub member_id: String,
    pub start_at: String,
    pub end_at: String,
    pub reason: Option<String>,
}

impl AvailabilityRow {
    pub fn into_window(self) -> AppResult<AvailabilityWindow> {
        Ok(AvailabilityWindow {
            member_id: self.member_id,
            start_at: schedule_utils::parse_datetime(&self.start_at)?,
            end_at: schedule_utils::parse_datetime(&self.end_at)?,
            reason: self.reason,
        })
    }
}

impl TryFrom<&Row<'_>> for AvailabilityRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            member_id: row.get("member_id")?,
            start_at: row.get("start_at")?,
            end_at: row.get("end_at")?,
            reason: row.get("reason")?,
        })
    }
}

/// Stored form: UTC with a fixed nine-digit fraction. Every value has the
/// same width, so text comparison in SQL follows time order.
fn storage_timestamp(value: DateTime<FixedOffset>) -> String {
    value
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub struct AvailabilityRepository;

impl AvailabilityRepository {
    pub fn insert(conn: &Connection, window: &AvailabilityWindow) -> AppResult<i64> {
        schedule_utils::ensure_window(window.start_at, window.end_at)?;
        conn.execute(
            r#"
                INSERT INTO availabilities (member_id, start_at, end_at, reason)
                VALUES (:member_id, :start_at, :end_at, :reason)
            "#,
            named_params! {
                ":member_id": &window.member_id,
                ":start_at": storage_timestamp(window.start_at),
                ":end_at": storage_timestamp(window.end_at),
                ":reason": &window.reason,
            },
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Windows of `member_id` touching `[start, end]` (inclusive bounds).
    pub fn list_overlapping(
        conn: &Connection,
        member_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<AvailabilityWindow>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, member_id, start_at, end_at, reason
                FROM availabilities
                WHERE member_id = :member_id
                  AND start_at <= :window_end
                  AND end_at >= :window_start
                ORDER BY start_at ASC, id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(
                named_params! {
                    ":member_id": member_id,
                    ":window_start": storage_timestamp(start),
                    ":window_end": storage_timestamp(end),
                },
                |row| AvailabilityRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(AvailabilityRow::into_window).collect()
    }
}
