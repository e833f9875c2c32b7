use chrono::{DateTime, FixedOffset};

use crate::models::assignment::{AssignmentResult, ExistingAssignment};
use crate::models::member::AvailabilityWindow;
use crate::services::schedule_utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOrigin {
    Committed,
    InRun,
}

/// The assignment a candidate interval collides with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSource {
    pub task_id: String,
    pub title: String,
    pub origin: ConflictOrigin,
}

impl ConflictSource {
    pub fn describe(&self) -> String {
        match self.origin {
            ConflictOrigin::Committed => format!("already assigned to \"{}\"", self.title),
            ConflictOrigin::InRun => format!("overlaps proposed \"{}\"", self.title),
        }
    }
}

pub fn is_unavailable(
    member_id: &str,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    windows: &[AvailabilityWindow],
) -> bool {
    windows.iter().any(|window| {
        window.member_id == member_id
            && schedule_utils::overlaps(start, end, window.start_at, window.end_at)
    })
}

/// Committed assignments are checked before the ones proposed earlier in
/// this run; the first hit is returned.
pub fn find_conflict(
    member_id: &str,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    existing: &[ExistingAssignment],
    in_run: &[AssignmentResult],
) -> Option<ConflictSource> {
    let committed = existing.iter().find(|assignment| {
        assignment.member_id == member_id
            && schedule_utils::overlaps(start, end, assignment.start_at, assignment.end_at)
    });
    if let Some(assignment) = committed {
        return Some(ConflictSource {
            task_id: assignment.task_id.clone(),
            title: assignment.title.clone(),
            origin: ConflictOrigin::Committed,
        });
    }

    in_run
        .iter()
        .find(|assignment| {
            assignment.member_id == member_id
                && schedule_utils::overlaps(start, end, assignment.start_at, assignment.end_at)
        })
        .map(|assignment| ConflictSource {
            task_id: assignment.task_id.clone(),
            title: assignment.task_title.clone(),
            origin: ConflictOrigin::InRun,
        })
}
