//! Per-node execution state

use serde::{Deserialize, Serialize};

/// Lifecycle status of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Execution state of a single node
///
/// `Idle -> Running -> Completed | Failed`; a reset returns the node to
/// `Idle` and clears the error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn running() -> Self {
        Self {
            status: ExecutionStatus::Running,
            error: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: ExecutionStatus::Completed,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ExecutionStatus::Failed
    }
}
