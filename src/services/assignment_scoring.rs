//! Scores one (task, member) pair.
//!
//! Every constraint toggle maps to a named [`ScoringPolicy`]. Policies run in
//! [`POLICY_ORDER`]; any of them may exclude the member outright, otherwise they
//! add signed entries to the breakdown. The total is the sum of the entries.

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tracing::trace;

use crate::models::assignment::{AssignmentResult, ExistingAssignment, ScoreEntry};
use crate::models::constraints::OptimizationConstraints;
use crate::models::member::{AvailabilityWindow, Member};
use crate::services::availability;
use crate::services::schedule_utils;
use crate::services::workload_tracker::WorkloadTracker;

pub const PREVIOUS_PERIOD_REPEAT_PENALTY: i64 = -20;
pub const PREVIOUS_PERIOD_HANDOFF_BONUS: i64 = 10;
pub const REPETITION_PENALTY: i64 = -10;
pub const CONSECUTIVE_WEEK_PENALTY: i64 = -15;
pub const TIGHT_SPACING_PENALTY: i64 = -5;
pub const WIDE_SPACING_BONUS: i64 = 5;
pub const NOVELTY_BONUS: i64 = 20;
pub const UNAVAILABLE_PENALTY: i64 = -10;
pub const SCHEDULE_CONFLICT_PENALTY: i64 = -5;
pub const OUTSIDE_HOURS_PENALTY: i64 = -20;
pub const WITHIN_HOURS_BONUS: i64 = 10;
pub const WORKLOAD_BASE_BONUS: f64 = 50.0;
pub const WORKLOAD_HOURLY_DECAY: f64 = 2.0;

/// Repeats closer than this many weeks count as tightly spaced.
const COMFORTABLE_GAP_WEEKS: i64 = 3;

pub const REASON_UNAVAILABLE: &str = "unavailable";
pub const REASON_CONSECUTIVE_WEEKS: &str = "consecutive weeks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringPolicy {
    TaskCap,
    PreviousPeriod,
    Repetition,
    Availability,
    ScheduleConflict,
    PreferredHours,
    WorkloadBalance,
}

pub const POLICY_ORDER: [ScoringPolicy; 7] = [
    ScoringPolicy::TaskCap,
    ScoringPolicy::PreviousPeriod,
    ScoringPolicy::Repetition,
    ScoringPolicy::Availability,
    ScoringPolicy::ScheduleConflict,
    ScoringPolicy::PreferredHours,
    ScoringPolicy::WorkloadBalance,
];

/// The pair being scored, with the task's timestamps already resolved.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub member: &'a Member,
    pub task_key: &'a str,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub week_index: i64,
}

/// Read-only view of everything a policy may consult.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub constraints: &'a OptimizationConstraints,
    pub tracker: &'a WorkloadTracker,
    pub availability: &'a [AvailabilityWindow],
    pub existing: &'a [ExistingAssignment],
    pub in_run: &'a [AssignmentResult],
    pub timezone: Tz,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberScore {
    pub score: i64,
    pub breakdown: Vec<ScoreEntry>,
    pub conflict_reasons: Vec<String>,
    pub is_repetition: bool,
    pub is_consecutive_week: bool,
}

impl MemberScore {
    fn push(&mut self, label: impl Into<String>, delta: i64) {
        self.score += delta;
        self.breakdown.push(ScoreEntry::new(label, delta));
    }

    pub fn has_conflict(&self) -> bool {
        !self.conflict_reasons.is_empty()
    }

    pub fn conflict_reason(&self) -> Option<String> {
        if self.conflict_reasons.is_empty() {
            None
        } else {
            Some(self.conflict_reasons.join("; "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Excluded {
        policy: ScoringPolicy,
        reason: String,
    },
    Scored(MemberScore),
}

enum Verdict {
    Continue,
    Exclude(String),
}

impl ScoringPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ScoringPolicy::TaskCap => "task_cap",
            ScoringPolicy::PreviousPeriod => "previous_period",
            ScoringPolicy::Repetition => "repetition",
            ScoringPolicy::Availability => "availability",
            ScoringPolicy::ScheduleConflict => "schedule_conflict",
            ScoringPolicy::PreferredHours => "preferred_hours",
            ScoringPolicy::WorkloadBalance => "workload_balance",
        }
    }

    fn apply(&self, candidate: &Candidate<'_>, ctx: &ScoringContext<'_>, acc: &mut MemberScore) -> Verdict {
        let member_id = candidate.member.id.as_str();
        let constraints = ctx.constraints;

        match self {
            ScoringPolicy::TaskCap => match constraints.max_tasks_per_user {
                Some(limit) if ctx.tracker.task_count_of(member_id) >= limit => {
                    Verdict::Exclude(format!("task cap of {limit} reached"))
                }
                _ => Verdict::Continue,
            },
            ScoringPolicy::PreviousPeriod => {
                if constraints.consider_previous_period && candidate.week_index == 0 {
                    if ctx
                        .tracker
                        .held_in_previous_last_week(member_id, candidate.task_key)
                    {
                        acc.push("held last week of previous period", PREVIOUS_PERIOD_REPEAT_PENALTY);
                    } else {
                        acc.push("clean handoff from previous period", PREVIOUS_PERIOD_HANDOFF_BONUS);
                    }
                }
                Verdict::Continue
            }
            ScoringPolicy::Repetition => {
                let history = ctx.tracker.history_of(member_id, candidate.task_key);
                let nearest_gap = history
                    .iter()
                    .map(|week| (candidate.week_index - week).abs())
                    .min();

                // Only an occurrence in the week right before counts as consecutive.
                let follows_last_week = history
                    .iter()
                    .any(|week| candidate.week_index - week == 1);

                acc.is_repetition = nearest_gap.is_some();
                acc.is_consecutive_week = follows_last_week;

                if !constraints.avoid_task_repetition {
                    return Verdict::Continue;
                }

                match nearest_gap {
                    None => acc.push("first time for member", NOVELTY_BONUS),
                    Some(gap) => {
                        let occurrences = history.len() as i64;
                        acc.push(
                            format!("repeated task (x{occurrences})"),
                            REPETITION_PENALTY * occurrences,
                        );
                        if constraints.avoid_consecutive_weeks && follows_last_week {
                            acc.push("consecutive weeks", CONSECUTIVE_WEEK_PENALTY);
                            acc.conflict_reasons.push(REASON_CONSECUTIVE_WEEKS.to_string());
                        } else if gap < COMFORTABLE_GAP_WEEKS {
                            acc.push(format!("tight spacing ({gap} wk)"), TIGHT_SPACING_PENALTY);
                        } else {
                            acc.push(format!("spaced out ({gap} wk)"), WIDE_SPACING_BONUS);
                        }
                    }
                }
                Verdict::Continue
            }
            ScoringPolicy::Availability => {
                if !availability::is_unavailable(
                    member_id,
                    candidate.start,
                    candidate.end,
                    ctx.availability,
                ) {
                    return Verdict::Continue;
                }
                if constraints.minimize_conflicts {
                    return Verdict::Exclude(REASON_UNAVAILABLE.to_string());
                }
                acc.push("member unavailable", UNAVAILABLE_PENALTY);
                acc.conflict_reasons.push(REASON_UNAVAILABLE.to_string());
                Verdict::Continue
            }
            ScoringPolicy::ScheduleConflict => {
                let Some(source) = availability::find_conflict(
                    member_id,
                    candidate.start,
                    candidate.end,
                    ctx.existing,
                    ctx.in_run,
                ) else {
                    return Verdict::Continue;
                };
                if constraints.minimize_conflicts {
                    return Verdict::Exclude(source.describe());
                }
                acc.push("schedule conflict", SCHEDULE_CONFLICT_PENALTY);
                acc.conflict_reasons.push(source.describe());
                Verdict::Continue
            }
            ScoringPolicy::PreferredHours => {
                let hour = schedule_utils::hour_in(candidate.start, ctx.timezone);
                if hour < constraints.preferred_start_hour || hour > constraints.preferred_end_hour {
                    acc.push(format!("outside preferred hours ({hour}h)"), OUTSIDE_HOURS_PENALTY);
                } else {
                    acc.push("within preferred hours", WITHIN_HOURS_BONUS);
                }
                Verdict::Continue
            }
            ScoringPolicy::WorkloadBalance => {
                if constraints.balance_workload {
                    let workload = ctx.tracker.workload_of(member_id);
                    let bonus = (WORKLOAD_BASE_BONUS - WORKLOAD_HOURLY_DECAY * workload).round() as i64;
                    acc.push(format!("workload balance ({workload:.1}h)"), bonus);
                }
                Verdict::Continue
            }
        }
    }
}

pub fn score_candidate(candidate: &Candidate<'_>, ctx: &ScoringContext<'_>) -> Evaluation {
    let mut acc = MemberScore::default();
    for policy in POLICY_ORDER {
        if let Verdict::Exclude(reason) = policy.apply(candidate, ctx, &mut acc) {
            trace!(
                target: "app::scoring",
                member_id = %candidate.member.id,
                policy = policy.name(),
                %reason,
                "member excluded"
            );
            return Evaluation::Excluded { policy, reason };
        }
    }
    Evaluation::Scored(acc)
}

pub fn render_score_details(entries: &[ScoreEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
