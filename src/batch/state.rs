//! Batch state machine and per-item outcomes

use std::path::PathBuf;

use serde::Serialize;

use crate::core::ItemId;

/// Where a batch run stands
///
/// `Idle -> Running` on start, `Running -> Running` per item, then
/// `Completed` if every item succeeded or `Idle` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Running {
        current_index: usize,
        completed: usize,
        cancel_requested: bool,
    },
    Completed {
        completed: usize,
        total: usize,
    },
}

impl BatchState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Result of one attempted item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ItemResult {
    /// Converted; the path is where the file ended up
    Converted(PathBuf),
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub id: ItemId,
    pub name: String,
    pub result: ItemResult,
}
