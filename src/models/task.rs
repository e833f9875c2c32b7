use serde::{Deserialize, Serialize};
use std::fmt;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ASSIGNED: &str = "assigned";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    /// Sort weight used when `respect_priority` is on.
    pub fn weight(&self) -> u8 {
        match self {
            TaskPriority::Low => 1,
            TaskPriority::Medium => 2,
            TaskPriority::High => 3,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskPriority {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(format!("unsupported task priority: {other}")),
        }
    }
}

/// One date-bound occurrence of a (possibly recurring) group task.
///
/// Timestamps stay as raw strings: the optimizer resolves them per task so a
/// malformed row only costs that task, not the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskOccurrence {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub start_at: Option<String>,
    #[serde(default)]
    pub end_at: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default = "default_status")]
    pub status: String,
    pub group_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl TaskOccurrence {
    /// Identity of the task definition: the recurring parent when the row was
    /// materialized from one, the occurrence itself otherwise.
    pub fn task_key(&self) -> &str {
        self.parent_id.as_deref().unwrap_or(&self.id)
    }

    pub fn is_recurring_occurrence(&self) -> bool {
        self.parent_id.is_some()
    }
}

fn default_status() -> String {
    STATUS_PENDING.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_key_prefers_parent_definition() {
        let task = TaskOccurrence {
            id: "occ-1".into(),
            title: "Trash".into(),
            start_at: None,
            end_at: None,
            due_date: None,
            start_time: None,
            duration_minutes: None,
            priority: TaskPriority::Low,
            status: STATUS_PENDING.into(),
            group_id: "g".into(),
            parent_id: Some("def-trash".into()),
        };
        assert_eq!(task.task_key(), "def-trash");
        assert!(task.is_recurring_occurrence());
    }

    #[test]
    fn priority_defaults_to_medium_when_missing() {
        let task: TaskOccurrence =
            serde_json::from_str(r#"{"id":"t","title":"Dishes","groupId":"g"}"#).unwrap();
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.status, STATUS_PENDING);
        assert_eq!(task.task_key(), "t");
    }
}
