use serde::{Deserialize, Serialize};

use crate::models::member::{AvailabilityWindow, Member};
use crate::models::task::TaskOccurrence;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMember {
    pub group_id: String,
    #[serde(flatten)]
    pub member: Member,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTask {
    #[serde(flatten)]
    pub task: TaskOccurrence,
    #[serde(default)]
    pub assignee_id: Option<String>,
}

/// Import payload for seeding the store from JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub members: Vec<SnapshotMember>,
    #[serde(default)]
    pub tasks: Vec<SnapshotTask>,
    #[serde(default)]
    pub availabilities: Vec<AvailabilityWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotImportSummary {
    pub groups: usize,
    pub members: usize,
    pub tasks: usize,
    pub availabilities: usize,
}
