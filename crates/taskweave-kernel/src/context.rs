//! Per-request aggregate of node outcomes: [`ExecutionContext`].

use std::collections::HashMap;

use crate::plan::{Node, NodeExecutionResult, NodeStatus};

/// Counts of nodes by status, cached alongside the outcome map and
/// invalidated on every `record_result`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
    pub retrying: usize,
    pub skipped: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.success + self.failed + self.retrying + self.skipped
    }
}

/// The per-request map of node outcomes plus cached aggregates.
///
/// Owned exclusively by the planner task driving the request; nothing
/// outside the executor/planner mutates it.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    results: HashMap<String, NodeExecutionResult>,
    counts: StatusCounts,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (insert or overwrite) a node's outcome and refresh the cached
    /// counts. Overwriting a terminal status is only valid when the caller
    /// is performing a deliberate retry (incrementing `retry_count`) — the
    /// context does not itself enforce that; the executor does.
    pub fn record_result(&mut self, result: NodeExecutionResult) {
        self.results.insert(result.node_id.clone(), result);
        self.recompute_counts();
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.results.get(node_id)
    }

    pub fn counts(&self) -> StatusCounts {
        self.counts
    }

    pub fn all_results(&self) -> impl Iterator<Item = &NodeExecutionResult> {
        self.results.values()
    }

    /// True iff `parent_id` is absent (no parent — a root) or its recorded
    /// status is `Success`.
    pub fn can_execute(&self, parent_id: Option<&str>) -> bool {
        match parent_id {
            None => true,
            Some(id) => self
                .get(id)
                .map(|r| r.status.is_success())
                .unwrap_or(true),
        }
    }

    /// The id of `failed_node_id`'s parent, if any — the point from which a
    /// retry strategy should re-attempt execution.
    pub fn find_retry_start_point(&self, failed_node_id: &str) -> Option<String> {
        self.get(failed_node_id)
            .and_then(|r| r.parent_node_id.clone())
    }

    /// Seed `Pending` outcomes for every node in `tree` that doesn't already
    /// have a recorded result, so `counts()` reflects the whole tree before
    /// execution starts.
    pub fn seed_pending(&mut self, roots: &[Node], now: chrono::DateTime<chrono::Utc>) {
        fn walk(node: &Node, parent: Option<&str>, depth: usize, ctx: &mut ExecutionContext, now: chrono::DateTime<chrono::Utc>) {
            if ctx.get(&node.id).is_none() {
                ctx.record_result(NodeExecutionResult::pending(node, parent.map(str::to_string), depth, now));
            }
            for child in &node.children {
                walk(child, Some(node.id.as_str()), depth + 1, ctx, now);
            }
        }
        for root in roots {
            walk(root, None, 1, self, now);
        }
    }

    fn recompute_counts(&mut self) {
        let mut counts = StatusCounts::default();
        for r in self.results.values() {
            match r.status {
                NodeStatus::Pending => counts.pending += 1,
                NodeStatus::Running => counts.running += 1,
                NodeStatus::Success => counts.success += 1,
                NodeStatus::Failed => counts.failed += 1,
                NodeStatus::Retrying => counts.retrying += 1,
                NodeStatus::Skipped => counts.skipped += 1,
            }
        }
        self.counts = counts;
    }
}
