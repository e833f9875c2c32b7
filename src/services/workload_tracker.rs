use std::collections::{HashMap, HashSet};

use crate::models::assignment::{HistoricalAssignment, MemberWorkload};
use crate::models::member::Member;
use crate::services::schedule_utils::PREVIOUS_PERIOD_WEEKS;

/// Running per-member state of one optimization run.
///
/// Owned by a single run and dropped with it, so concurrent runs never share
/// counters.
#[derive(Debug, Clone, Default)]
pub struct WorkloadTracker {
    workload: HashMap<String, f64>,
    task_count: HashMap<String, u32>,
    history: HashMap<String, HashMap<String, Vec<i64>>>,
    previous_last_week: HashSet<(String, String)>,
}

impl WorkloadTracker {
    pub fn new(members: &[Member]) -> Self {
        let mut tracker = Self::default();
        for member in members {
            tracker.workload.insert(member.id.clone(), 0.0);
            tracker.task_count.insert(member.id.clone(), 0);
            tracker.history.insert(member.id.clone(), HashMap::new());
        }
        tracker
    }

    /// Keeps only what the week-0 boundary check needs: who held which task
    /// in the last week before the period.
    pub fn with_previous_period(mut self, previous: &[HistoricalAssignment]) -> Self {
        let last_week = PREVIOUS_PERIOD_WEEKS - 1;
        self.previous_last_week = previous
            .iter()
            .filter(|entry| entry.week_index == last_week)
            .map(|entry| (entry.member_id.clone(), entry.task_id.clone()))
            .collect();
        self
    }

    pub fn record_assignment(&mut self, member_id: &str, task_key: &str, week_index: i64, hours: f64) {
        debug_assert!(hours >= 0.0, "workload only grows within a run");
        *self.workload.entry(member_id.to_string()).or_insert(0.0) += hours.max(0.0);
        *self.task_count.entry(member_id.to_string()).or_insert(0) += 1;
        self.history
            .entry(member_id.to_string())
            .or_default()
            .entry(task_key.to_string())
            .or_default()
            .push(week_index);
    }

    pub fn workload_of(&self, member_id: &str) -> f64 {
        self.workload.get(member_id).copied().unwrap_or(0.0)
    }

    pub fn task_count_of(&self, member_id: &str) -> u32 {
        self.task_count.get(member_id).copied().unwrap_or(0)
    }

    /// Week indices at which the member already took `task_key` in this run,
    /// in the order they were recorded.
    pub fn history_of(&self, member_id: &str, task_key: &str) -> &[i64] {
        self.history
            .get(member_id)
            .and_then(|tasks| tasks.get(task_key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn held_in_previous_last_week(&self, member_id: &str, task_key: &str) -> bool {
        self.previous_last_week
            .contains(&(member_id.to_string(), task_key.to_string()))
    }

    pub fn distribution(&self, members: &[Member]) -> Vec<MemberWorkload> {
        members
            .iter()
            .map(|member| MemberWorkload {
                member_id: member.id.clone(),
                member_name: member.name.clone(),
                hours: self.workload_of(&member.id),
                task_count: self.task_count_of(&member.id),
            })
            .collect()
    }
}
