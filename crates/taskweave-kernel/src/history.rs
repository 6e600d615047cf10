//! Per-request timeline entry: [`ExecutionHistory`], and the serializable
//! [`HistorySnapshot`] served to `enumerate executions` / `subscribe`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::StatusCounts;
use crate::plan::ExecutionTree;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    #[default]
    Running,
    Completed,
    Failed,
    Retrying,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Final, user-facing outcome of a request.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RequestResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<ExecutionTree>,
}

/// One request's timeline: status, result, and the accumulated log tape.
///
/// There is exactly one `ExecutionHistory` per request; repeated retry
/// attempts mutate this same entry (via
/// [`crate::history::HistoryManager::update`] in the runtime) rather than
/// appending a new one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionHistory {
    pub id: Uuid,
    pub query: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub result: RequestResult,
    pub logs: Vec<String>,
}

impl ExecutionHistory {
    pub fn new_running(query: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            start_time: now,
            end_time: None,
            status: RequestStatus::Running,
            result: RequestResult::default(),
            logs: Vec::new(),
        }
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }
}

/// Snapshot of an [`ExecutionHistory`] plus node counts, served by both the
/// pull (`enumerate`) and push (`subscribe`) external surfaces from a single
/// function so the two stay in agreement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistorySnapshot {
    pub id: Uuid,
    pub query: String,
    pub status: RequestStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<ExecutionTree>,
    pub node_count: usize,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
    pub running_nodes: usize,
}

impl HistorySnapshot {
    pub fn from_history(history: &ExecutionHistory, counts: StatusCounts) -> Self {
        Self {
            id: history.id,
            query: history.query.clone(),
            status: history.status,
            start_time: history.start_time,
            end_time: history.end_time,
            result: history.result.text.clone(),
            error: history.result.error.clone(),
            logs: history.logs.clone(),
            tree: history.result.tree.clone(),
            node_count: counts.total(),
            completed_nodes: counts.success,
            failed_nodes: counts.failed,
            running_nodes: counts.running,
        }
    }
}
