use std::collections::HashMap;

use tracing::info;

use crate::db::repositories::availability_repository::AvailabilityRepository;
use crate::db::repositories::member_repository::MemberRepository;
use crate::db::repositories::task_repository::TaskRepository;
use crate::error::AppError;
use crate::models::snapshot::{Snapshot, SnapshotImportSummary};

use super::{AppState, CommandResult};

/// Loads a snapshot in one transaction; a bad row rolls back everything.
/// Groups, members and tasks are upserted by id, availability windows are
/// appended.
pub fn snapshot_import(state: &AppState, snapshot: Snapshot) -> CommandResult<SnapshotImportSummary> {
    if let Some(task) = snapshot.tasks.iter().find(|task| task.task.id.trim().is_empty()) {
        return Err(AppError::validation(format!(
            "task \"{}\" has an empty id",
            task.task.title
        ))
        .into());
    }

    let summary = state.db().with_transaction(|conn| {
        for group in &snapshot.groups {
            MemberRepository::upsert_group(conn, group)?;
        }

        let mut positions: HashMap<&str, i64> = HashMap::new();
        for member in &snapshot.members {
            let position = positions.entry(member.group_id.as_str()).or_insert(0);
            MemberRepository::upsert_member(conn, member, *position)?;
            *position += 1;
        }

        for task in &snapshot.tasks {
            TaskRepository::upsert(conn, task)?;
        }

        for window in &snapshot.availabilities {
            AvailabilityRepository::insert(conn, window)?;
        }

        Ok(SnapshotImportSummary {
            groups: snapshot.groups.len(),
            members: snapshot.members.len(),
            tasks: snapshot.tasks.len(),
            availabilities: snapshot.availabilities.len(),
        })
    })?;

    info!(
        target: "app::command",
        groups = summary.groups,
        members = summary.members,
        tasks = summary.tasks,
        availabilities = summary.availabilities,
        "snapshot imported"
    );
    Ok(summary)
}
