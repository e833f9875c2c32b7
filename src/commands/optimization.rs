use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::assignment::{AssignmentResult, CommitReport, OptimizationProposal};
use crate::services::assignment_service::OptimizationRequest;

use super::{AppState, CommandError, CommandResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInput {
    pub assignments: Vec<AssignmentResult>,
}

impl From<OptimizationProposal> for AcceptInput {
    fn from(proposal: OptimizationProposal) -> Self {
        Self {
            assignments: proposal.result.assignments,
        }
    }
}

pub fn optimization_propose(
    state: &AppState,
    request: OptimizationRequest,
) -> CommandResult<OptimizationProposal> {
    debug!(
        target: "app::command",
        group_id = %request.group_id,
        period_start = %request.period_start,
        "optimization_propose"
    );
    let proposal = state.assignments().propose(request)?;
    info!(
        target: "app::command",
        group_id = %proposal.group_id,
        assigned = proposal.result.stats.assigned_tasks,
        unassigned = proposal.result.unassigned_tasks.len(),
        "proposal ready"
    );
    Ok(proposal)
}

pub fn optimization_accept(state: &AppState, input: AcceptInput) -> CommandResult<CommitReport> {
    if input.assignments.is_empty() {
        return Err(CommandError::new(
            "VALIDATION_ERROR",
            "no assignments to accept",
            None,
        ));
    }
    debug!(target: "app::command", count = input.assignments.len(), "optimization_accept");
    state
        .assignments()
        .accept(&input.assignments)
        .map_err(CommandError::from)
}
