//! Shared scaffolding for the integration tests in `tests/tests/`.
//!
//! The test doubles themselves (capabilities, a scripted LLM client) live in
//! `taskweave_runtime::testkit` since that crate's own unit tests need them
//! too; this crate only wires a whole [`Planner`] together from them.

use std::sync::Arc;

use async_trait::async_trait;
use taskweave_kernel::{
    CapabilityDescription, ClientLease, ComparisonResult, EvaluationResult, ExecutionHistory,
    FeasibilityResult, LLMClient, LLMTaskRouter, LlmResult, OperationTier, OrchestratorConfig,
    ParamSpec, RawTree, RetryStrategyResult, RouterError, TierReadiness,
};
use taskweave_runtime::testkit::ScriptedLlmClient;
use taskweave_runtime::{
    BroadcastEventPublisher, HistoryManager, InMemoryCapabilityRegistry, Planner,
};

/// A `Planner` wired to `registry` and a router whose SIMPLE/MEDIUM/COMPLEX
/// tiers all resolve to the same scripted client, for tests that don't care
/// which tier serves a given call.
pub fn planner_with_scripted_router(
    registry: Arc<InMemoryCapabilityRegistry>,
    scripted: Arc<ScriptedLlmClient>,
    max_attempts: u32,
) -> Planner {
    let router = Arc::new(SingleClientRouter(scripted));
    let history = Arc::new(HistoryManager::new());
    let publisher = Arc::new(BroadcastEventPublisher::default());
    let config = OrchestratorConfig { max_attempts, ..OrchestratorConfig::default() };
    Planner::new(registry, router, history, publisher, &config)
}

/// Hands out an independent [`ClonedClient`] per tier acquisition, all
/// forwarding to the one shared `ScriptedLlmClient` — needed because that
/// client isn't `Clone` and `LLMTaskRouter::select_for_tier` returns an
/// owned [`ClientLease`].
struct SingleClientRouter(Arc<ScriptedLlmClient>);

#[async_trait]
impl LLMTaskRouter for SingleClientRouter {
    async fn select_for_tier(&self, _tier: OperationTier) -> Result<ClientLease, RouterError> {
        Ok(Box::new(ClonedClient(self.0.clone())))
    }

    async fn readiness(&self) -> Vec<TierReadiness> {
        vec![]
    }
}

struct ClonedClient(Arc<ScriptedLlmClient>);

#[async_trait]
impl LLMClient for ClonedClient {
    fn provider_name(&self) -> &str {
        self.0.provider_name()
    }

    fn model_id(&self) -> &str {
        self.0.model_id()
    }

    async fn validate_feasibility(
        &self,
        query: &str,
        catalog: &[CapabilityDescription],
    ) -> LlmResult<FeasibilityResult> {
        self.0.validate_feasibility(query, catalog).await
    }

    async fn create_tree(&self, query: &str, catalog: &[CapabilityDescription]) -> LlmResult<RawTree> {
        self.0.create_tree(query, catalog).await
    }

    async fn extract_parameters(
        &self,
        prior_result_text: &str,
        parameter_schema: &std::collections::HashMap<String, ParamSpec>,
    ) -> LlmResult<std::collections::HashMap<String, serde_json::Value>> {
        self.0.extract_parameters(prior_result_text, parameter_schema).await
    }

    async fn evaluate_result(&self, query: &str, result_text: &str) -> LlmResult<EvaluationResult> {
        self.0.evaluate_result(query, result_text).await
    }

    async fn compare_executions(
        &self,
        query: &str,
        previous_tree_text: &str,
        previous_result: &str,
        current_tree_text: &str,
        current_result: &str,
    ) -> LlmResult<ComparisonResult> {
        self.0
            .compare_executions(query, previous_tree_text, previous_result, current_tree_text, current_result)
            .await
    }

    async fn suggest_retry(
        &self,
        query: &str,
        history: &ExecutionHistory,
        catalog: &[CapabilityDescription],
    ) -> LlmResult<RetryStrategyResult> {
        self.0.suggest_retry(query, history, catalog).await
    }
}
