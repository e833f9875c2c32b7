use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::assignment::{
    AssignmentResult, CommitReport, ExistingAssignment, HistoricalAssignment,
    OptimizationProposal,
};
use crate::models::constraints::{OptimizationConstraints, PeriodConfig};
use crate::models::member::{AvailabilityWindow, Member};
use crate::models::task::TaskOccurrence;
use crate::services::assignment_optimizer::{
    resolve_task_window, AssignmentOptimizer, OptimizationInput,
};
use crate::services::schedule_utils;

/// Backing store the assignment flow reads its snapshot from and commits to.
pub trait AssignmentStore: Send + Sync {
    /// Occurrences of the group that start inside the window and have no
    /// assignee yet. Recurring definitions are expected to be materialized.
    fn fetch_unassigned_occurrences(
        &self,
        group_id: &str,
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<TaskOccurrence>>;

    fn fetch_group_members(&self, group_id: &str) -> AppResult<Vec<Member>>;

    fn fetch_availability(
        &self,
        member_ids: &[String],
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<AvailabilityWindow>>;

    fn fetch_existing_assignments(
        &self,
        member_ids: &[String],
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<ExistingAssignment>>;

    /// Assignments of the four weeks before `period_start`, with week
    /// indices relative to the start of that window.
    fn fetch_previous_period_assignments(
        &self,
        group_id: &str,
        period_start: DateTime<FixedOffset>,
    ) -> AppResult<Vec<HistoricalAssignment>>;

    /// Binds one task to its member and marks it assigned.
    fn apply_assignment(&self, assignment: &AssignmentResult) -> AppResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    pub group_id: String,
    pub period_start: String,
    #[serde(default)]
    pub period: PeriodConfig,
    #[serde(default)]
    pub constraints: Option<OptimizationConstraints>,
}

/// Two-phase entry point: `propose` computes a proposal from a fresh
/// snapshot, `accept` persists a chosen set of assignments.
#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn AssignmentStore>,
    default_constraints: OptimizationConstraints,
    timezone: Tz,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        Self {
            store,
            default_constraints: OptimizationConstraints::default(),
            timezone: chrono_tz::UTC,
        }
    }

    pub fn with_defaults(mut self, constraints: OptimizationConstraints) -> Self {
        self.default_constraints = constraints;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn propose(&self, request: OptimizationRequest) -> AppResult<OptimizationProposal> {
        if request.group_id.trim().is_empty() {
            return Err(AppError::validation("groupId is required"));
        }
        let constraints = request
            .constraints
            .unwrap_or_else(|| self.default_constraints.clone());
        constraints.validate()?;

        let period_start = schedule_utils::parse_datetime(&request.period_start)?;
        let period = schedule_utils::resolve_period(period_start, &request.period)?;
        let group_id = request.group_id.as_str();

        let tasks = self
            .store
            .fetch_unassigned_occurrences(group_id, period.start_at, period.end_at)
            .map_err(|err| AppError::data_source("fetch unassigned occurrences", &err))?;
        let members = self
            .store
            .fetch_group_members(group_id)
            .map_err(|err| AppError::data_source("fetch group members", &err))?;
        let member_ids: Vec<String> = members.iter().map(|member| member.id.clone()).collect();

        // A task may start inside the period and run past its end.
        let horizon_end = tasks
            .iter()
            .filter_map(|task| resolve_task_window(task, self.timezone).ok())
            .map(|(_, end)| end)
            .fold(period.end_at, |horizon, end| horizon.max(end));
        let availability = self
            .store
            .fetch_availability(&member_ids, period.start_at, horizon_end)
            .map_err(|err| AppError::data_source("fetch availability", &err))?;
        let existing = self
            .store
            .fetch_existing_assignments(&member_ids, period.start_at, horizon_end)
            .map_err(|err| AppError::data_source("fetch existing assignments", &err))?;
        let previous = if constraints.consider_previous_period {
            self.store
                .fetch_previous_period_assignments(group_id, period.start_at)
                .map_err(|err| AppError::data_source("fetch previous period assignments", &err))?
        } else {
            Vec::new()
        };

        info!(
            target: "app::assignment",
            %group_id,
            period_start = %schedule_utils::format_datetime(period.start_at),
            period_end = %schedule_utils::format_datetime(period.end_at),
            tasks = tasks.len(),
            members = members.len(),
            "snapshot fetched"
        );

        let optimizer = AssignmentOptimizer::new(constraints.clone()).with_timezone(self.timezone);
        let result = optimizer.optimize(&OptimizationInput {
            period_start: period.start_at,
            tasks: &tasks,
            members: &members,
            availability: &availability,
            existing: &existing,
            previous: &previous,
        });

        Ok(OptimizationProposal {
            group_id: request.group_id,
            period,
            constraints,
            result,
            generated_at: Utc::now().to_rfc3339(),
        })
    }

    /// Applies the assignments one by one, in order. There is no rollback:
    /// the first failure stops the loop, the earlier updates stay applied and
    /// the error lists them.
    pub fn accept(&self, assignments: &[AssignmentResult]) -> AppResult<CommitReport> {
        let mut applied = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            if let Err(err) = self.store.apply_assignment(assignment) {
                return Err(AppError::commit(&assignment.task_id, applied, &err));
            }
            applied.push(assignment.task_id.clone());
        }

        info!(target: "app::assignment", applied = applied.len(), "assignments committed");
        Ok(CommitReport {
            applied,
            committed_at: Utc::now().to_rfc3339(),
        })
    }
}
