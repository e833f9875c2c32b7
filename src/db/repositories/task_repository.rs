use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::snapshot::SnapshotTask;
use crate::models::task::{TaskOccurrence, TaskPriority, STATUS_ASSIGNED, STATUS_PENDING};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        group_id,
        parent_id,
        title,
        start_at,
        end_at,
        due_date,
        start_time,
        duration_minutes,
        priority,
        status,
        assignee_id
    FROM tasks
"#;

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub group_id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub due_date: Option<String>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub priority: String,
    pub status: String,
    pub assignee_id: Option<String>,
}

impl TaskRow {
    pub fn from_snapshot(task: &SnapshotTask) -> Self {
        let occurrence = &task.task;
        Self {
            id: occurrence.id.clone(),
            group_id: occurrence.group_id.clone(),
            parent_id: occurrence.parent_id.clone(),
            title: occurrence.title.clone(),
            start_at: occurrence.start_at.clone(),
            end_at: occurrence.end_at.clone(),
            due_date: occurrence.due_date.clone(),
            start_time: occurrence.start_time.clone(),
            duration_minutes: occurrence.duration_minutes,
            priority: occurrence.priority.as_str().to_string(),
            status: if task.assignee_id.is_some() && occurrence.status == STATUS_PENDING {
                STATUS_ASSIGNED.to_string()
            } else {
                occurrence.status.clone()
            },
            assignee_id: task.assignee_id.clone(),
        }
    }

    pub fn into_occurrence(self) -> AppResult<TaskOccurrence> {
        Ok(TaskOccurrence {
            id: self.id,
            title: self.title,
            start_at: self.start_at,
            end_at: self.end_at,
            due_date: self.due_date,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            priority: TaskPriority::try_from(self.priority.as_str()).map_err(AppError::validation)?,
            status: self.status,
            group_id: self.group_id,
            parent_id: self.parent_id,
        })
    }
}

impl TryFrom<&Row<'_>> for TaskRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            group_id: row.get("group_id")?,
            parent_id: row.get("parent_id")?,
            title: row.get("title")?,
            start_at: row.get("start_at")?,
            end_at: row.get("end_at")?,
            due_date: row.get("due_date")?,
            start_time: row.get("start_time")?,
            duration_minutes: row.get("duration_minutes")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            assignee_id: row.get("assignee_id")?,
        })
    }
}

pub struct TaskRepository;

impl TaskRepository {
    pub fn upsert(conn: &Connection, task: &SnapshotTask) -> AppResult<()> {
        let row = TaskRow::from_snapshot(task);
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id, group_id, parent_id, title, start_at, end_at, due_date,
                    start_time, duration_minutes, priority, status, assignee_id
                ) VALUES (
                    :id, :group_id, :parent_id, :title, :start_at, :end_at, :due_date,
                    :start_time, :duration_minutes, :priority, :status, :assignee_id
                )
                ON CONFLICT(id) DO UPDATE SET
                    group_id = excluded.group_id,
                    parent_id = excluded.parent_id,
                    title = excluded.title,
                    start_at = excluded.start_at,
                    end_at = excluded.end_at,
                    due_date = excluded.due_date,
                    start_time = excluded.start_time,
                    duration_minutes = excluded.duration_minutes,
                    priority = excluded.priority,
                    status = excluded.status,
                    assignee_id = excluded.assignee_id,
                    updated_at = CURRENT_TIMESTAMP
            "#,
            named_params! {
                ":id": &row.id,
                ":group_id": &row.group_id,
                ":parent_id": &row.parent_id,
                ":title": &row.title,
                ":start_at": &row.start_at,
                ":end_at": &row.end_at,
                ":due_date": &row.due_date,
                ":start_time": &row.start_time,
                ":duration_minutes": &row.duration_minutes,
                ":priority": &row.priority,
                ":status": &row.status,
                ":assignee_id": &row.assignee_id,
            },
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<TaskRow>> {
        let sql = format!("{BASE_SELECT} WHERE id = :id");
        let mut stmt = conn.prepare(&sql)?;
        let row = stmt
            .query_row(named_params! {":id": id}, |row| TaskRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    /// Pending occurrences of the group without an assignee, oldest first.
    pub fn list_unassigned(conn: &Connection, group_id: &str) -> AppResult<Vec<TaskOccurrence>> {
        let sql = format!(
            "{BASE_SELECT} WHERE group_id = :group_id AND assignee_id IS NULL AND status = :status \
             ORDER BY COALESCE(start_at, due_date), id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                named_params! {":group_id": group_id, ":status": STATUS_PENDING},
                |row| TaskRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(TaskRow::into_occurrence).collect()
    }

    pub fn list_assigned_to(conn: &Connection, member_id: &str) -> AppResult<Vec<TaskRow>> {
        let sql = format!("{BASE_SELECT} WHERE assignee_id = :member_id ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(named_params! {":member_id": member_id}, |row| {
                TaskRow::try_from(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_assigned_in_group(conn: &Connection, group_id: &str) -> AppResult<Vec<TaskRow>> {
        let sql = format!(
            "{BASE_SELECT} WHERE group_id = :group_id AND assignee_id IS NOT NULL ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(named_params! {":group_id": group_id}, |row| {
                TaskRow::try_from(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Claims the task for `member_id` only while it is still unassigned.
    /// Returns the number of rows changed (0 or 1).
    pub fn assign_if_unassigned(conn: &Connection, task_id: &str, member_id: &str) -> AppResult<usize> {
        let changed = conn.execute(
            r#"
                UPDATE tasks
                SET assignee_id = :member_id,
                    status = :status,
                    assigned_at = :assigned_at,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = :id AND assignee_id IS NULL
            "#,
            named_params! {
                ":id": task_id,
                ":member_id": member_id,
                ":status": STATUS_ASSIGNED,
                ":assigned_at": Utc::now().to_rfc3339(),
            },
        )?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", 1).unwrap();
        migrations::run(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO groups (id, name) VALUES ('flat', 'Flat 3B');
            INSERT INTO group_members (id, group_id, name) VALUES ('alice', 'flat', 'Alice');
            "#,
        )
        .unwrap();
        conn
    }

    fn task(id: &str, assignee: Option<&str>) -> SnapshotTask {
        SnapshotTask {
            task: TaskOccurrence {
                id: id.into(),
                title: format!("Task {id}"),
                start_at: Some("2025-03-03T19:00:00Z".into()),
                end_at: None,
                due_date: None,
                start_time: None,
                duration_minutes: Some(30),
                priority: TaskPriority::High,
                status: STATUS_PENDING.into(),
                group_id: "flat".into(),
                parent_id: Some("trash".into()),
            },
            assignee_id: assignee.map(str::to_string),
        }
    }

    #[test]
    fn unassigned_listing_skips_assigned_rows() {
        let conn = setup();
        TaskRepository::upsert(&conn, &task("t1", None)).unwrap();
        TaskRepository::upsert(&conn, &task("t2", Some("alice"))).unwrap();

        let open = TaskRepository::list_unassigned(&conn, "flat").unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "t1");
        assert_eq!(open[0].priority, TaskPriority::High);
        assert_eq!(open[0].task_key(), "trash");

        let stored = TaskRepository::find_by_id(&conn, "t2").unwrap().unwrap();
        assert_eq!(stored.status, STATUS_ASSIGNED);
    }

    #[test]
    fn assign_only_claims_free_tasks() {
        let conn = setup();
        TaskRepository::upsert(&conn, &task("t1", None)).unwrap();

        assert_eq!(TaskRepository::assign_if_unassigned(&conn, "t1", "alice").unwrap(), 1);
        assert_eq!(TaskRepository::assign_if_unassigned(&conn, "t1", "alice").unwrap(), 0);
        assert_eq!(TaskRepository::assign_if_unassigned(&conn, "missing", "alice").unwrap(), 0);
        assert_eq!(TaskRepository::list_assigned_to(&conn, "alice").unwrap().len(), 1);
    }

    #[test]
    fn unknown_assignee_violates_foreign_key() {
        let conn = setup();
        TaskRepository::upsert(&conn, &task("t1", None)).unwrap();
        let err = TaskRepository::assign_if_unassigned(&conn, "t1", "mallory").unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }
}
