//! Tree Executor: runs a validated [`ExecutionTree`] with dependency
//! gating, sequential parameter chaining, and parallel fan-out.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::join_all;
use taskweave_kernel::{
    CapabilityRegistry, ExecutionContext, ExecutionTree, LLMTaskRouter, Node, NodeExecutionResult,
    NodeRef, NodeStatus, OperationTier,
};

/// Invoked after every node-status transition is recorded into the run's
/// [`ExecutionContext`] — the planner wires this to append a log line and
/// republish a [`taskweave_kernel::HistorySnapshot`], giving subscribers
/// node-level visibility instead of only per-attempt visibility.
pub type TransitionHook = dyn Fn(&NodeExecutionResult) + Send + Sync;

pub struct ExecutionOutcome {
    pub text: String,
    pub context: ExecutionContext,
}

/// Stateless across calls: holds only shared collaborators. Each
/// [`Self::execute_tree`] call creates its own [`ExecutionRun`] (context +
/// parameter-extraction cache), which is dropped at the end of the call —
/// the cache never outlives a single attempt.
pub struct TreeExecutor {
    registry: Arc<dyn CapabilityRegistry>,
    router: Arc<dyn LLMTaskRouter>,
}

impl TreeExecutor {
    pub fn new(registry: Arc<dyn CapabilityRegistry>, router: Arc<dyn LLMTaskRouter>) -> Self {
        Self { registry, router }
    }

    pub async fn execute_tree(
        &self,
        tree: &ExecutionTree,
        attempt: u32,
        on_transition: Option<Arc<TransitionHook>>,
    ) -> ExecutionOutcome {
        let mut context = ExecutionContext::new();
        context.seed_pending(&tree.roots, Utc::now());

        let run = Arc::new(ExecutionRun {
            registry: self.registry.clone(),
            router: self.router.clone(),
            context: Mutex::new(context),
            cache: Mutex::new(HashMap::new()),
            on_transition,
            attempt,
        });

        let root_futs: Vec<_> = tree
            .roots
            .iter()
            .map(|root| run.execute_node(root, None, 1, root.args.clone()))
            .collect();
        let outcomes = join_all(root_futs).await;

        let text = outcomes
            .iter()
            .filter_map(|o| o.1.clone())
            .collect::<Vec<_>>()
            .join("\n");

        let context = run.context.lock().unwrap().clone();
        ExecutionOutcome { text, context }
    }
}

type NodeOutcome = (NodeStatus, Option<String>, Option<String>);

struct ExecutionRun {
    registry: Arc<dyn CapabilityRegistry>,
    router: Arc<dyn LLMTaskRouter>,
    context: Mutex<ExecutionContext>,
    cache: Mutex<HashMap<(String, String), HashMap<String, serde_json::Value>>>,
    on_transition: Option<Arc<TransitionHook>>,
    attempt: u32,
}

impl ExecutionRun {
    fn record(
        &self,
        node: &Node,
        parent_id: Option<&str>,
        depth: usize,
        status: NodeStatus,
        result: Option<String>,
        error: Option<String>,
    ) {
        let outcome = NodeExecutionResult {
            node_id: node.id.clone(),
            node: NodeRef::from(node),
            status,
            result,
            error,
            timestamp: Utc::now(),
            retry_count: self.attempt.saturating_sub(1),
            depth,
            parent_node_id: parent_id.map(str::to_string),
        };

        match status {
            NodeStatus::Running => tracing::info!(node_id = %outcome.node_id, capability = %node.capability, "node running"),
            NodeStatus::Success => tracing::info!(node_id = %outcome.node_id, "node succeeded"),
            NodeStatus::Failed => tracing::error!(node_id = %outcome.node_id, error = ?outcome.error, "node failed"),
            NodeStatus::Skipped => tracing::warn!(node_id = %outcome.node_id, "node skipped: parent did not succeed"),
            _ => {}
        }

        if let Some(hook) = &self.on_transition {
            hook(&outcome);
        }
        self.context.lock().unwrap().record_result(outcome);
    }

    /// Mark every descendant of `node` as SKIPPED. Relies on `node`'s own
    /// outcome already being visible in the context as non-SUCCESS (either
    /// `Running` or a terminal non-success status is enough — `can_execute`
    /// only special-cases SUCCESS) so each child's own gating check skips it.
    fn cascade_skip<'a>(
        self: &'a Arc<Self>,
        node: &'a Node,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            for child in &node.children {
                self.execute_node(child, Some(node.id.as_str()), depth + 1, child.args.clone())
                    .await;
            }
        })
    }

    fn execute_node<'a>(
        self: &'a Arc<Self>,
        node: &'a Node,
        parent_id: Option<&'a str>,
        depth: usize,
        effective_args: HashMap<String, serde_json::Value>,
    ) -> Pin<Box<dyn Future<Output = NodeOutcome> + Send + 'a>> {
        Box::pin(async move {
            if !self.context.lock().unwrap().can_execute(parent_id) {
                self.record(node, parent_id, depth, NodeStatus::Skipped, None, Some("parent failed".into()));
                self.cascade_skip(node, depth).await;
                return (NodeStatus::Skipped, None, Some("parent failed".to_string()));
            }

            self.record(node, parent_id, depth, NodeStatus::Running, None, None);

            if !self.registry.contains(&node.capability) {
                let err = format!("capability {:?} not found", node.capability);
                self.cascade_skip(node, depth).await;
                self.record(node, parent_id, depth, NodeStatus::Failed, None, Some(err.clone()));
                return (NodeStatus::Failed, None, Some(err));
            }

            let (mut status, mut result, mut error) = match self
                .registry
                .execute(&node.capability, &node.function, effective_args)
                .await
            {
                Ok(text) => (NodeStatus::Success, Some(text), None),
                Err(e) => (NodeStatus::Failed, None, Some(e.to_string())),
            };

            if !node.children.is_empty() {
                if status == NodeStatus::Success {
                    let parent_result = result.clone().unwrap_or_default();
                    let (agg_result, any_failed, all_succeeded, child_errors) = if node.parallel {
                        self.run_parallel_children(node, depth, &parent_result).await
                    } else {
                        self.run_sequential_children(node, depth, &parent_result).await
                    };
                    if any_failed {
                        status = NodeStatus::Failed;
                        error = Some(child_errors.join("; "));
                    } else if all_succeeded {
                        status = NodeStatus::Success;
                    }
                    result = Some(agg_result);
                } else {
                    self.cascade_skip(node, depth).await;
                }
            }

            self.record(node, parent_id, depth, status, result.clone(), error.clone());
            (status, result, error)
        })
    }

    async fn run_parallel_children(
        self: &Arc<Self>,
        node: &Node,
        depth: usize,
        parent_result: &str,
    ) -> (String, bool, bool, Vec<String>) {
        let mut futs = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let args = self.extract_args(child, parent_result).await;
            futs.push(self.execute_node(child, Some(node.id.as_str()), depth + 1, args));
        }
        let outcomes = join_all(futs).await;
        let any_failed = outcomes.iter().any(|o| o.0 == NodeStatus::Failed);
        let all_succeeded = outcomes.iter().all(|o| o.0 == NodeStatus::Success);
        let joined = outcomes.iter().filter_map(|o| o.1.clone()).collect::<Vec<_>>().join("\n");
        let errors = outcomes.iter().filter_map(|o| o.2.clone()).collect();
        (joined, any_failed, all_succeeded, errors)
    }

    async fn run_sequential_children(
        self: &Arc<Self>,
        node: &Node,
        depth: usize,
        parent_result: &str,
    ) -> (String, bool, bool, Vec<String>) {
        let mut prev_text = parent_result.to_string();
        let mut last_result = String::new();
        let mut any_failed = false;
        let mut all_succeeded = true;
        let mut errors = Vec::new();
        for child in &node.children {
            let args = self.extract_args(child, &prev_text).await;
            let outcome = self.execute_node(child, Some(node.id.as_str()), depth + 1, args).await;
            if let Some(text) = &outcome.1 {
                prev_text = text.clone();
                last_result = text.clone();
            }
            any_failed |= outcome.0 == NodeStatus::Failed;
            all_succeeded &= outcome.0 == NodeStatus::Success;
            if let Some(err) = &outcome.2 {
                errors.push(err.clone());
            }
        }
        (last_result, any_failed, all_succeeded, errors)
    }

    /// Turn `prior_text` into `child`'s argument map via a SIMPLE-tier LLM
    /// call against its declared parameter schema, memoized on
    /// `(prior_text, schema)` for the lifetime of this run. Falls back to
    /// the child's declared args on any failure — extraction never fails
    /// the child itself.
    async fn extract_args(&self, child: &Node, prior_text: &str) -> HashMap<String, serde_json::Value> {
        let Some(desc) = self.registry.describe(&child.capability) else {
            return child.args.clone();
        };
        let Some(fn_spec) = desc.functions.get(&child.function) else {
            return child.args.clone();
        };
        if fn_spec.parameters.is_empty() {
            return child.args.clone();
        }

        let schema_key = serde_json::to_string(&fn_spec.parameters).unwrap_or_default();
        let cache_key = (prior_text.to_string(), schema_key);
        if let Some(cached) = self.cache.lock().unwrap().get(&cache_key) {
            return cached.clone();
        }

        let Ok(client) = self.router.select_for_tier(OperationTier::Simple).await else {
            return child.args.clone();
        };

        match client.extract_parameters(prior_text, &fn_spec.parameters).await {
            Ok(args) => {
                self.cache.lock().unwrap().insert(cache_key, args.clone());
                args
            }
            Err(_) => child.args.clone(),
        }
    }
}
