//! Status transition rules for deployment records

use chrono::Utc;

use crate::errors::OrchestratorError;
use crate::models::deployment::{Deployment, DeploymentStatus};

/// Check a status transition against the lifecycle table
pub fn ensure_transition(
    from: DeploymentStatus,
    to: DeploymentStatus,
) -> Result<(), OrchestratorError> {
    match (from, to) {
        // From Pending
        (DeploymentStatus::Pending, DeploymentStatus::InProgress) => Ok(()),

        // From InProgress
        (DeploymentStatus::InProgress, DeploymentStatus::Succeeded) => Ok(()),
        (DeploymentStatus::InProgress, DeploymentStatus::Failed) => Ok(()),

        // Any record can be superseded by a successful rollback
        (from, DeploymentStatus::RolledBack) if from != DeploymentStatus::RolledBack => Ok(()),

        // Invalid transitions
        (from, to) => Err(OrchestratorError::InvalidTransition(format!(
            "{} -> {}",
            from, to
        ))),
    }
}

/// Apply a validated transition to a record in memory.
///
/// Sets `started_at` on entering IN_PROGRESS and `completed_at` on first
/// entering a terminal status; `error_message` is set only for FAILED.
pub fn apply_transition(
    deployment: &mut Deployment,
    to: DeploymentStatus,
    message: Option<&str>,
) -> Result<(), OrchestratorError> {
    ensure_transition(deployment.status, to)?;

    let now = Utc::now();
    deployment.status = to;
    deployment.updated_at = now;

    match to {
        DeploymentStatus::InProgress => {
            deployment.started_at = Some(now);
        }
        DeploymentStatus::Failed => {
            deployment.error_message = message.map(String::from);
            deployment.completed_at.get_or_insert(now);
        }
        _ if to.is_terminal() => {
            deployment.completed_at.get_or_insert(now);
        }
        _ => {}
    }

    Ok(())
}
