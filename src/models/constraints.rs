use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use crate::error::{AppError, AppResult};

const DEFAULT_PREFERRED_START_HOUR: u32 = 8;
const DEFAULT_PREFERRED_END_HOUR: u32 = 20;

/// Toggles that drive the scoring policies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizationConstraints {
    pub balance_workload: bool,
    pub respect_priority: bool,
    pub minimize_conflicts: bool,
    pub max_tasks_per_user: Option<u32>,
    pub preferred_start_hour: u32,
    pub preferred_end_hour: u32,
    pub avoid_task_repetition: bool,
    pub avoid_consecutive_weeks: bool,
    pub consider_previous_period: bool,
}

impl Default for OptimizationConstraints {
    fn default() -> Self {
        Self {
            balance_workload: true,
            respect_priority: true,
            minimize_conflicts: true,
            max_tasks_per_user: None,
            preferred_start_hour: DEFAULT_PREFERRED_START_HOUR,
            preferred_end_hour: DEFAULT_PREFERRED_END_HOUR,
            avoid_task_repetition: true,
            avoid_consecutive_weeks: true,
            consider_previous_period: false,
        }
    }
}

impl OptimizationConstraints {
    pub fn validate(&self) -> AppResult<()> {
        if self.preferred_start_hour > 23 || self.preferred_end_hour > 23 {
            return Err(AppError::validation_with_details(
                "preferred hours must be between 0 and 23",
                json!({
                    "preferredStartHour": self.preferred_start_hour,
                    "preferredEndHour": self.preferred_end_hour,
                }),
            ));
        }
        if self.preferred_start_hour > self.preferred_end_hour {
            return Err(AppError::validation_with_details(
                "preferred start hour is after preferred end hour",
                json!({
                    "preferredStartHour": self.preferred_start_hour,
                    "preferredEndHour": self.preferred_end_hour,
                }),
            ));
        }
        if self.max_tasks_per_user == Some(0) {
            return Err(AppError::validation(
                "maxTasksPerUser must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    #[default]
    Weeks,
    Months,
}

impl PeriodUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Weeks => "weeks",
            PeriodUnit::Months => "months",
        }
    }
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PeriodUnit {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "weeks" => Ok(PeriodUnit::Weeks),
            "months" => Ok(PeriodUnit::Months),
            other => Err(format!("unsupported period unit: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodConfig {
    pub duration: u32,
    pub unit: PeriodUnit,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            duration: 4,
            unit: PeriodUnit::Weeks,
        }
    }
}

/// Concrete scheduling window of one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodWindow {
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
}
