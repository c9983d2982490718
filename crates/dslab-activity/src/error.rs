//! Errors.

use thiserror::Error;

/// Errors reported while configuring or running a simulation.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("invalid task selection policy {0} (expected 0-6)")]
    InvalidTaskPolicy(u32),
    #[error("invalid resource selection policy {0} (expected 0-4)")]
    InvalidResourcePolicy(u32),
    #[error("workload must contain at least one task")]
    EmptyWorkload,
    #[error("platform must contain at least one compute resource")]
    EmptyPlatform,
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("invalid task graph: {0}")]
    InvalidGraph(String),
    #[error("task {task} cannot be placed on any resource")]
    Unschedulable { task: String },
    #[error("scheduling invariant violated: {0}")]
    InvariantViolation(String),
    #[error("job submission rejected: {0}")]
    SubmitRejected(String),
    #[error("task {task} failed: {reason}")]
    JobFailed { task: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActivityError>;

impl ActivityError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors detected before any scheduling starts.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTaskPolicy(_)
                | Self::InvalidResourcePolicy(_)
                | Self::EmptyWorkload
                | Self::EmptyPlatform
                | Self::InvalidParameter { .. }
                | Self::InvalidGraph(_)
                | Self::Unschedulable { .. }
        )
    }
}
