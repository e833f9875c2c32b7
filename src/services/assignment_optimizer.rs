use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::assignment::{
    AssignmentResult, ExistingAssignment, HistoricalAssignment, OptimizationResult,
    OptimizationStats, UnassignedReason, UnassignedTask,
};
use crate::models::constraints::OptimizationConstraints;
use crate::models::member::{AvailabilityWindow, Member};
use crate::models::task::TaskOccurrence;
use crate::services::assignment_scoring::{
    render_score_details, score_candidate, Candidate, Evaluation, MemberScore, ScoringContext,
};
use crate::services::schedule_utils;
use crate::services::workload_tracker::WorkloadTracker;

const DEFAULT_TASK_MINUTES: i64 = 60;

/// Frozen snapshot a run works on.
#[derive(Debug, Clone, Copy)]
pub struct OptimizationInput<'a> {
    pub period_start: DateTime<FixedOffset>,
    pub tasks: &'a [TaskOccurrence],
    pub members: &'a [Member],
    pub availability: &'a [AvailabilityWindow],
    pub existing: &'a [ExistingAssignment],
    pub previous: &'a [HistoricalAssignment],
}

/// Single-pass greedy assignment of task occurrences to group members.
///
/// The optimizer is a pure function of its input: it reads the snapshot,
/// keeps its running state in a [`WorkloadTracker`] local to [`optimize`],
/// and returns a proposal. Given the same input (roster order included) the
/// result is identical.
///
/// [`optimize`]: AssignmentOptimizer::optimize
#[derive(Debug, Clone)]
pub struct AssignmentOptimizer {
    constraints: OptimizationConstraints,
    timezone: Tz,
}

impl AssignmentOptimizer {
    pub fn new(constraints: OptimizationConstraints) -> Self {
        Self {
            constraints,
            timezone: chrono_tz::UTC,
        }
    }

    /// Zone used to read task start hours and local `startTime` fields.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn constraints(&self) -> &OptimizationConstraints {
        &self.constraints
    }

    pub fn optimize(&self, input: &OptimizationInput<'_>) -> OptimizationResult {
        info!(
            target: "app::optimizer",
            tasks = input.tasks.len(),
            members = input.members.len(),
            unavailable_windows = input.availability.len(),
            existing = input.existing.len(),
            "starting assignment run"
        );

        let mut tracker = WorkloadTracker::new(input.members);
        if self.constraints.consider_previous_period {
            tracker = tracker.with_previous_period(input.previous);
        }

        let mut assignments: Vec<AssignmentResult> = Vec::new();
        let mut unassigned: Vec<UnassignedTask> = Vec::new();

        for task in self.ordered_tasks(input.tasks) {
            let (start, end) = match resolve_task_window(task, self.timezone) {
                Ok(window) => window,
                Err(err) => {
                    warn!(
                        target: "app::optimizer",
                        task_id = %task.id,
                        error = %err,
                        "skipping task with malformed schedule"
                    );
                    unassigned.push(UnassignedTask {
                        task_id: task.id.clone(),
                        title: task.title.clone(),
                        reason: UnassignedReason::InvalidSchedule,
                        detail: Some(err.to_string()),
                    });
                    continue;
                }
            };

            let week_index = schedule_utils::week_index_of(start, input.period_start);
            let task_key = task.task_key();

            let (winner, exclusions) = {
                let ctx = ScoringContext {
                    constraints: &self.constraints,
                    tracker: &tracker,
                    availability: input.availability,
                    existing: input.existing,
                    in_run: &assignments,
                    timezone: self.timezone,
                };
                select_member(input.members, task_key, start, end, week_index, &ctx)
            };

            let Some((member, score)) = winner else {
                let detail = if exclusions.is_empty() {
                    "no members in group".to_string()
                } else {
                    exclusions.join("; ")
                };
                debug!(target: "app::optimizer", task_id = %task.id, %detail, "no eligible member");
                unassigned.push(UnassignedTask {
                    task_id: task.id.clone(),
                    title: task.title.clone(),
                    reason: UnassignedReason::NoEligibleMember,
                    detail: Some(detail),
                });
                continue;
            };

            let hours = schedule_utils::duration_hours(start, end);
            tracker.record_assignment(&member.id, task_key, week_index, hours);

            debug!(
                target: "app::optimizer",
                task_id = %task.id,
                member_id = %member.id,
                score = score.score,
                week_index,
                "task assigned"
            );

            assignments.push(AssignmentResult {
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                member_id: member.id.clone(),
                member_name: member.name.clone(),
                start_at: start,
                end_at: end,
                week_index,
                duration_hours: hours,
                has_conflict: score.has_conflict(),
                conflict_reason: score.conflict_reason(),
                score: score.score,
                score_details: render_score_details(&score.breakdown),
                score_breakdown: score.breakdown,
                is_repetition: score.is_repetition,
                is_consecutive_week: score.is_consecutive_week,
            });
        }

        let result = aggregate(assignments, unassigned, &tracker, input);
        info!(
            target: "app::optimizer",
            assigned = result.stats.assigned_tasks,
            unassigned = result.stats.unassigned_tasks,
            conflicts = result.stats.conflicts_detected,
            repetitions = result.stats.repetitions_count,
            "assignment run finished"
        );
        result
    }

    fn ordered_tasks<'t>(&self, tasks: &'t [TaskOccurrence]) -> Vec<&'t TaskOccurrence> {
        let mut ordered: Vec<&TaskOccurrence> = tasks.iter().collect();
        if self.constraints.respect_priority {
            // stable: equal priorities keep input order
            ordered.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()));
        }
        ordered
    }
}

/// Resolves the concrete start/end of an occurrence: explicit `startAt`
/// (with `endAt` or a duration), else `dueDate` + `startTime` read in
/// `timezone` plus the duration.
pub fn resolve_task_window(
    task: &TaskOccurrence,
    timezone: Tz,
) -> AppResult<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let minutes = task.duration_minutes.unwrap_or(DEFAULT_TASK_MINUTES);

    let (start, end) = match (&task.start_at, &task.due_date, &task.start_time) {
        (Some(raw_start), _, _) => {
            let start = schedule_utils::parse_datetime(raw_start)?;
            let end = match &task.end_at {
                Some(raw_end) => schedule_utils::parse_datetime(raw_end)?,
                None => schedule_utils::add_minutes(start, minutes)?,
            };
            (start, end)
        }
        (None, Some(date), Some(time)) => {
            let start = schedule_utils::parse_local_datetime(date, time, timezone)?;
            (start, schedule_utils::add_minutes(start, minutes)?)
        }
        _ => {
            return Err(AppError::validation(format!(
                "task {} has neither startAt nor dueDate with startTime",
                task.id
            )))
        }
    };

    schedule_utils::ensure_window(start, end)?;
    Ok((start, end))
}

/// Strictly highest score wins; ties go to the lower current workload, then
/// to roster order.
fn select_member<'m>(
    members: &'m [Member],
    task_key: &str,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    week_index: i64,
    ctx: &ScoringContext<'_>,
) -> (Option<(&'m Member, MemberScore)>, Vec<String>) {
    let mut best: Option<(&Member, MemberScore)> = None;
    let mut exclusions = Vec::new();

    for member in members {
        let candidate = Candidate {
            member,
            task_key,
            start,
            end,
            week_index,
        };
        match score_candidate(&candidate, ctx) {
            Evaluation::Excluded { reason, .. } => {
                exclusions.push(format!("{}: {reason}", member.id));
            }
            Evaluation::Scored(score) => {
                let replace = match &best {
                    None => true,
                    Some((current, current_score)) => {
                        score.score > current_score.score
                            || (score.score == current_score.score
                                && ctx.tracker.workload_of(&member.id)
                                    < ctx.tracker.workload_of(&current.id))
                    }
                };
                if replace {
                    best = Some((member, score));
                }
            }
        }
    }

    (best, exclusions)
}

fn aggregate(
    assignments: Vec<AssignmentResult>,
    unassigned: Vec<UnassignedTask>,
    tracker: &WorkloadTracker,
    input: &OptimizationInput<'_>,
) -> OptimizationResult {
    let stats = OptimizationStats {
        total_tasks: input.tasks.len(),
        assigned_tasks: assignments.len(),
        unassigned_tasks: unassigned.len(),
        conflicts_detected: assignments.iter().filter(|a| a.has_conflict).count(),
        repetitions_count: assignments.iter().filter(|a| a.is_repetition).count(),
        consecutive_weeks_count: assignments
            .iter()
            .filter(|a| a.is_repetition && a.is_consecutive_week)
            .count(),
        workload_distribution: tracker.distribution(input.members),
    };

    OptimizationResult {
        assignments,
        unassigned_tasks: unassigned,
        stats,
    }
}
