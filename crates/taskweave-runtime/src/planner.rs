//! Planner/Coordinator: the per-request retry-loop state machine
//! (`INIT → PLANNING → VALIDATING → EXECUTING → EVALUATING → {DONE,
//! RETRYING, ABORTED}`).

use std::sync::{Arc, Mutex};

use chrono::Utc;
use taskweave_kernel::{
    CapabilityDescription, CapabilityRegistry, EventPublisher, ExecutionHistory, ExecutionTree,
    FeasibilityResult, HistorySnapshot, LLMTaskRouter, NodeExecutionResult, NodeStatus,
    OperationTier, OrchestratorConfig, RawTree, RequestResult, RequestStatus, StatusCounts,
};

use crate::executor::{TransitionHook, TreeExecutor};
use crate::history::HistoryManager;

enum RetryDecision {
    NewTree(RawTree),
    Stop(String),
    Unavailable(String),
}

/// Drives one request end to end: feasibility, tree creation, validation,
/// execution, evaluation, and the retry loop around all of it.
pub struct Planner {
    registry: Arc<dyn CapabilityRegistry>,
    router: Arc<dyn LLMTaskRouter>,
    history: Arc<HistoryManager>,
    publisher: Arc<dyn EventPublisher>,
    max_attempts: u32,
}

impl Planner {
    pub fn new(
        registry: Arc<dyn CapabilityRegistry>,
        router: Arc<dyn LLMTaskRouter>,
        history: Arc<HistoryManager>,
        publisher: Arc<dyn EventPublisher>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            router,
            history,
            publisher,
            max_attempts: config.max_attempts,
        }
    }

    pub async fn run(&self, query: &str) -> ExecutionHistory {
        let mut history = ExecutionHistory::new_running(query, Utc::now());
        self.history.append(history.clone());
        self.publish(&history, StatusCounts::default());
        tracing::info!(request_id = %history.id, "INIT -> PLANNING");

        let catalog = self.registry.describe_all();
        let mut previous_history: Option<ExecutionHistory> = None;
        let mut previous_tree_text = String::new();
        let mut previous_result_text = String::new();

        for attempt in 1..=self.max_attempts {
            tracing::info!(request_id = %history.id, attempt, "PLANNING");

            let raw_tree = if attempt == 1 {
                let feasibility = self.check_feasibility(query, &catalog).await;
                if !feasibility.feasible {
                    let mut reason = feasibility.reason.clone();
                    if let Some(suggestion) = &feasibility.suggestion {
                        reason.push_str(&format!(" (suggestion: {suggestion})"));
                    }
                    return self.terminate_failed(history, reason, None).await;
                }
                match self.create_initial_tree(query, &catalog).await {
                    Ok(tree) => tree,
                    Err(reason) => return self.terminate_failed(history, reason, None).await,
                }
            } else {
                let previous = previous_history
                    .as_ref()
                    .expect("previous_history is set before every continue past attempt 1");
                match self.build_retry_tree(query, previous, &catalog).await {
                    RetryDecision::NewTree(tree) => tree,
                    RetryDecision::Stop(reason) => {
                        return self.terminate_failed(history, format!("stopped: {reason}"), None).await
                    }
                    RetryDecision::Unavailable(reason) => {
                        return self.terminate_failed(history, reason, None).await
                    }
                }
            };

            tracing::info!(request_id = %history.id, attempt, "VALIDATING");
            let validator = taskweave_kernel::PlanValidator::new(&catalog);
            let validation_name = format!("{}-a{attempt}", history.id);
            let outcome = validator.validate_and_fix(&validation_name, &raw_tree);
            if !outcome.is_valid {
                let reason = outcome
                    .errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return self
                    .terminate_failed(history, format!("plan validation failed: {reason}"), None)
                    .await;
            }
            for warning in &outcome.warnings {
                tracing::warn!(request_id = %history.id, ?warning, "validator auto-repair");
            }
            let tree = outcome.fixed_tree.expect("is_valid implies fixed_tree is Some");

            tracing::info!(request_id = %history.id, attempt, "EXECUTING");
            let executor = TreeExecutor::new(self.registry.clone(), self.router.clone());
            let node_logs: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
            let exec_outcome = executor.execute_tree(&tree, attempt, Some(self.node_transition_hook(&node_logs))).await;
            for line in node_logs.lock().unwrap().drain(..) {
                history.push_log(line);
            }
            self.publish_with_context(&history, &exec_outcome.context);

            tracing::info!(request_id = %history.id, attempt, "EVALUATING");
            let eval = self.evaluate(query, &exec_outcome.text, &history).await;

            if eval.is_satisfactory && !eval.needs_retry {
                history.status = RequestStatus::Completed;
                history.end_time = Some(Utc::now());
                history.result = RequestResult {
                    text: Some(exec_outcome.text.clone()),
                    error: None,
                    tree: Some(tree.clone()),
                };
                history.push_log(format!("attempt {attempt} satisfied the request"));
                tracing::info!(request_id = %history.id, "DONE: completed");
                self.history.update(history.clone());
                self.publish_with_context(&history, &exec_outcome.context);
                return history;
            }

            if eval.needs_retry && attempt < self.max_attempts {
                let tree_text = serde_json::to_string(&tree).unwrap_or_default();

                if !previous_tree_text.is_empty() {
                    if let Some(reason) = self
                        .check_no_progress(
                            query,
                            &previous_tree_text,
                            &previous_result_text,
                            &tree_text,
                            &exec_outcome.text,
                        )
                        .await
                    {
                        history.status = RequestStatus::Failed;
                        history.end_time = Some(Utc::now());
                        history.result = RequestResult {
                            text: Some(exec_outcome.text.clone()),
                            error: Some(reason),
                            tree: Some(tree.clone()),
                        };
                        history.push_log("aborting: no significant progress between attempts".to_string());
                        tracing::warn!(request_id = %history.id, "ABORTED: no significant progress");
                        self.history.update(history.clone());
                        self.publish_with_context(&history, &exec_outcome.context);
                        return history;
                    }
                }

                history.status = RequestStatus::Retrying;
                history.result = RequestResult {
                    text: Some(exec_outcome.text.clone()),
                    error: Some(eval.reason.clone()),
                    tree: Some(tree.clone()),
                };
                history.push_log(format!("attempt {attempt} failed evaluation: {}", eval.reason));
                tracing::warn!(request_id = %history.id, attempt, "RETRYING");
                self.history.update(history.clone());
                self.publish_with_context(&history, &exec_outcome.context);

                previous_history = Some(history.clone());
                previous_tree_text = tree_text;
                previous_result_text = exec_outcome.text.clone();
                history.status = RequestStatus::Running;
                continue;
            }

            history.status = if eval.is_satisfactory {
                RequestStatus::Completed
            } else {
                RequestStatus::Failed
            };
            history.end_time = Some(Utc::now());
            history.result = RequestResult {
                text: Some(exec_outcome.text.clone()),
                error: if eval.is_satisfactory { None } else { Some(eval.reason.clone()) },
                tree: Some(tree.clone()),
            };
            history.push_log(format!("attempt {attempt} terminal: {}", eval.reason));
            tracing::info!(request_id = %history.id, status = ?history.status, "DONE");
            self.history.update(history.clone());
            self.publish_with_context(&history, &exec_outcome.context);
            return history;
        }

        history.status = RequestStatus::Failed;
        history.end_time = Some(Utc::now());
        history.result.error = Some("maximum attempts reached".into());
        history.push_log("maximum attempts reached".to_string());
        tracing::error!(request_id = %history.id, "ABORTED: max attempts reached");
        self.history.update(history.clone());
        self.publish(&history, StatusCounts::default());
        history
    }

    /// Builds the per-attempt hook the executor calls on every node-status
    /// transition, giving node start/complete/fail/skip entries in the
    /// request's log tape instead of only the attempt-boundary lines this
    /// method's callers already push.
    fn node_transition_hook(&self, node_logs: &Arc<Mutex<Vec<String>>>) -> Arc<TransitionHook> {
        let node_logs = node_logs.clone();
        Arc::new(move |result: &NodeExecutionResult| {
            let line = match result.status {
                NodeStatus::Running => format!("node {} started ({})", result.node_id, result.node.capability),
                NodeStatus::Success => format!("node {} completed", result.node_id),
                NodeStatus::Failed => {
                    format!("node {} failed: {}", result.node_id, result.error.as_deref().unwrap_or("unknown error"))
                }
                NodeStatus::Skipped => format!("node {} skipped", result.node_id),
                other => format!("node {} transitioned to {other:?}", result.node_id),
            };
            node_logs.lock().unwrap().push(line);
        })
    }

    async fn check_feasibility(&self, query: &str, catalog: &[CapabilityDescription]) -> FeasibilityResult {
        let fallback = || FeasibilityResult {
            feasible: true,
            reason: "feasibility check unavailable; proceeding optimistically".into(),
            suggestion: None,
        };
        match self.router.select_for_tier(OperationTier::Simple).await {
            Ok(client) => match client.validate_feasibility(query, catalog).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("feasibility check failed, treating request as feasible: {e}");
                    fallback()
                }
            },
            Err(e) => {
                tracing::warn!("SIMPLE tier unavailable for feasibility check, treating request as feasible: {e}");
                fallback()
            }
        }
    }

    async fn create_initial_tree(&self, query: &str, catalog: &[CapabilityDescription]) -> Result<RawTree, String> {
        let client = self
            .router
            .select_for_tier(OperationTier::Complex)
            .await
            .map_err(|e| format!("tree creation unavailable: {e}"))?;
        client
            .create_tree(query, catalog)
            .await
            .map_err(|e| format!("tree creation failed: {e}"))
    }

    async fn build_retry_tree(
        &self,
        query: &str,
        previous: &ExecutionHistory,
        catalog: &[CapabilityDescription],
    ) -> RetryDecision {
        let client = match self.router.select_for_tier(OperationTier::Complex).await {
            Ok(c) => c,
            Err(e) => return RetryDecision::Unavailable(format!("retry strategy unavailable: {e}")),
        };
        match client.suggest_retry(query, previous, catalog).await {
            Ok(strategy) if strategy.should_stop => RetryDecision::Stop(strategy.reason),
            Ok(strategy) => match strategy.new_tree {
                Some(tree) => RetryDecision::NewTree(tree),
                None => RetryDecision::Unavailable("retry strategy produced no replacement tree".into()),
            },
            Err(e) => RetryDecision::Unavailable(format!("retry strategy unavailable: {e}")),
        }
    }

    async fn evaluate(
        &self,
        query: &str,
        result_text: &str,
        history: &ExecutionHistory,
    ) -> taskweave_kernel::EvaluationResult {
        match self.router.select_for_tier(OperationTier::Medium).await {
            Ok(client) => match client.evaluate_result(query, result_text).await {
                Ok(eval) => eval,
                Err(e) => {
                    tracing::error!(request_id = %history.id, "evaluation call failed: {e}");
                    taskweave_kernel::EvaluationResult {
                        is_satisfactory: false,
                        reason: format!("evaluation failed: {e}"),
                        needs_retry: true,
                    }
                }
            },
            Err(e) => {
                tracing::error!(request_id = %history.id, "MEDIUM tier unavailable for evaluation: {e}");
                taskweave_kernel::EvaluationResult {
                    is_satisfactory: false,
                    reason: format!("evaluation unavailable: {e}"),
                    needs_retry: true,
                }
            }
        }
    }

    /// Returns `Some(reason)` if the comparator judges this attempt
    /// equivalent to the last one, signalling the planner to abort rather
    /// than burn the remaining retry budget.
    async fn check_no_progress(
        &self,
        query: &str,
        previous_tree_text: &str,
        previous_result: &str,
        current_tree_text: &str,
        current_result: &str,
    ) -> Option<String> {
        let client = self.router.select_for_tier(OperationTier::Medium).await.ok()?;
        let comparison = client
            .compare_executions(query, previous_tree_text, previous_result, current_tree_text, current_result)
            .await
            .ok()?;
        if comparison.is_significantly_different {
            None
        } else {
            Some("no significant progress between attempts".to_string())
        }
    }

    async fn terminate_failed(
        &self,
        mut history: ExecutionHistory,
        reason: String,
        tree: Option<ExecutionTree>,
    ) -> ExecutionHistory {
        history.status = RequestStatus::Failed;
        history.end_time = Some(Utc::now());
        history.result = RequestResult { text: None, error: Some(reason.clone()), tree };
        history.push_log(reason.clone());
        tracing::error!(request_id = %history.id, "{reason}");
        self.history.update(history.clone());
        self.publish(&history, StatusCounts::default());
        history
    }

    fn publish(&self, history: &ExecutionHistory, counts: StatusCounts) {
        self.publisher.publish(HistorySnapshot::from_history(history, counts));
    }

    fn publish_with_context(&self, history: &ExecutionHistory, context: &taskweave_kernel::ExecutionContext) {
        self.publish(history, context.counts());
    }
}
