use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::constraints::{OptimizationConstraints, PeriodWindow};

/// A task already bound to a member before the run. Only used for conflict
/// detection, never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExistingAssignment {
    pub task_id: String,
    pub title: String,
    pub member_id: String,
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
}

/// Assignment from the weeks preceding the period. `week_index` is relative to
/// the start of that previous window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalAssignment {
    pub member_id: String,
    pub task_id: String,
    pub week_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub label: String,
    pub delta: i64,
}

impl ScoreEntry {
    pub fn new(label: impl Into<String>, delta: i64) -> Self {
        Self {
            label: label.into(),
            delta,
        }
    }
}

impl fmt::Display for ScoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:+})", self.label, self.delta)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub task_id: String,
    pub task_title: String,
    pub member_id: String,
    pub member_name: String,
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
    pub week_index: i64,
    pub duration_hours: f64,
    pub has_conflict: bool,
    #[serde(default)]
    pub conflict_reason: Option<String>,
    pub score: i64,
    pub score_details: String,
    #[serde(default)]
    pub score_breakdown: Vec<ScoreEntry>,
    pub is_repetition: bool,
    pub is_consecutive_week: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    InvalidSchedule,
    NoEligibleMember,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedTask {
    pub task_id: String,
    pub title: String,
    pub reason: UnassignedReason,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberWorkload {
    pub member_id: String,
    pub member_name: String,
    pub hours: f64,
    pub task_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationStats {
    pub total_tasks: usize,
    pub assigned_tasks: usize,
    pub unassigned_tasks: usize,
    pub conflicts_detected: usize,
    pub repetitions_count: usize,
    pub consecutive_weeks_count: usize,
    pub workload_distribution: Vec<MemberWorkload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub assignments: Vec<AssignmentResult>,
    pub unassigned_tasks: Vec<UnassignedTask>,
    pub stats: OptimizationStats,
}

/// What `propose` hands back: the optimizer result plus the inputs that shaped
/// it. Nothing in here has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationProposal {
    pub group_id: String,
    pub period: PeriodWindow,
    pub constraints: OptimizationConstraints,
    pub result: OptimizationResult,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub applied: Vec<String>,
    pub committed_at: String,
}
