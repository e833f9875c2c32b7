use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::db::repositories::availability_repository::AvailabilityRepository;
use crate::db::repositories::member_repository::MemberRepository;
use crate::db::repositories::task_repository::{TaskRepository, TaskRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::assignment::{AssignmentResult, ExistingAssignment, HistoricalAssignment};
use crate::models::member::{AvailabilityWindow, Member};
use crate::models::task::TaskOccurrence;
use crate::services::assignment_optimizer::resolve_task_window;
use crate::services::assignment_service::AssignmentStore;
use crate::services::schedule_utils;

/// `AssignmentStore` over the local SQLite database.
///
/// Occurrence windows are resolved here with the same rules the optimizer
/// uses, so `dueDate` + `startTime` rows are filtered in the configured zone.
#[derive(Clone, Debug)]
pub struct SqliteAssignmentStore {
    pool: DbPool,
    timezone: Tz,
}

impl SqliteAssignmentStore {
    pub fn new(pool: DbPool, timezone: Tz) -> Self {
        Self { pool, timezone }
    }

    fn resolved(&self, row: TaskRow) -> Option<(TaskOccurrence, String, DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let assignee = row.assignee_id.clone()?;
        let task = match row.into_occurrence() {
            Ok(task) => task,
            Err(err) => {
                warn!(target: "app::db", error = %err, "skipping unreadable task row");
                return None;
            }
        };
        match resolve_task_window(&task, self.timezone) {
            Ok((start, end)) => Some((task, assignee, start, end)),
            Err(err) => {
                warn!(target: "app::db", task_id = %task.id, error = %err, "skipping assigned task with malformed schedule");
                None
            }
        }
    }
}

impl AssignmentStore for SqliteAssignmentStore {
    /// Rows whose schedule cannot be resolved are passed through so the
    /// optimizer reports them instead of dropping them silently.
    fn fetch_unassigned_occurrences(
        &self,
        group_id: &str,
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<TaskOccurrence>> {
        let tasks = self
            .pool
            .with_connection(|conn| TaskRepository::list_unassigned(conn, group_id))?;

        let selected: Vec<TaskOccurrence> = tasks
            .into_iter()
            .filter(|task| match resolve_task_window(task, self.timezone) {
                Ok((start, _)) => start >= window_start && start < window_end,
                Err(_) => true,
            })
            .collect();

        debug!(target: "app::db", %group_id, count = selected.len(), "unassigned occurrences loaded");
        Ok(selected)
    }

    fn fetch_group_members(&self, group_id: &str) -> AppResult<Vec<Member>> {
        self.pool.with_connection(|conn| {
            if !MemberRepository::group_exists(conn, group_id)? {
                return Err(AppError::not_found());
            }
            MemberRepository::list_for_group(conn, group_id)
        })
    }

    fn fetch_availability(
        &self,
        member_ids: &[String],
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<AvailabilityWindow>> {
        self.pool.with_connection(|conn| {
            let mut windows = Vec::new();
            for member_id in member_ids {
                windows.extend(AvailabilityRepository::list_overlapping(
                    conn,
                    member_id,
                    window_start,
                    window_end,
                )?);
            }
            Ok(windows)
        })
    }

    fn fetch_existing_assignments(
        &self,
        member_ids: &[String],
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<ExistingAssignment>> {
        let rows = self.pool.with_connection(|conn| {
            let mut rows = Vec::new();
            for member_id in member_ids {
                rows.extend(TaskRepository::list_assigned_to(conn, member_id)?);
            }
            Ok(rows)
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|row| self.resolved(row))
            .filter(|(_, _, start, end)| {
                schedule_utils::overlaps(*start, *end, window_start, window_end)
            })
            .map(|(task, member_id, start_at, end_at)| ExistingAssignment {
                task_id: task.id,
                title: task.title,
                member_id,
                start_at,
                end_at,
            })
            .collect())
    }

    fn fetch_previous_period_assignments(
        &self,
        group_id: &str,
        period_start: DateTime<FixedOffset>,
    ) -> AppResult<Vec<HistoricalAssignment>> {
        let history_start = schedule_utils::previous_period_start(period_start);
        let rows = self
            .pool
            .with_connection(|conn| TaskRepository::list_assigned_in_group(conn, group_id))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| self.resolved(row))
            .filter(|(_, _, start, _)| *start >= history_start && *start < period_start)
            .map(|(task, member_id, start, _)| HistoricalAssignment {
                member_id,
                task_id: task.task_key().to_string(),
                week_index: schedule_utils::week_index_of(start, history_start),
            })
            .collect())
    }

    fn apply_assignment(&self, assignment: &AssignmentResult) -> AppResult<()> {
        self.pool.with_connection(|conn| {
            let changed =
                TaskRepository::assign_if_unassigned(conn, &assignment.task_id, &assignment.member_id)?;
            if changed == 1 {
                return Ok(());
            }
            match TaskRepository::find_by_id(conn, &assignment.task_id)? {
                None => Err(AppError::not_found()),
                Some(row) => Err(AppError::conflict(format!(
                    "task {} is already assigned to {}",
                    row.id,
                    row.assignee_id.as_deref().unwrap_or("someone else")
                ))),
            }
        })
    }
}
