//! LLM client contract and the structured responses each planner operation
//! expects back.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::CapabilityDescription;
use crate::history::ExecutionHistory;
use crate::plan::RawTree;

/// Complexity tier a planner operation is statically tagged with, used by
/// the [`crate::router::LLMTaskRouter`] to select a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationTier {
    Simple,
    Medium,
    Complex,
}

/// The eight planner operations, each statically mapped to a complexity
/// tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlannerOperation {
    FeasibilityCheck,
    ParameterExtraction,
    DirectAnswerProbe,
    ResultEvaluation,
    CrossAttemptComparison,
    DirectAnswerGeneration,
    InitialTreeCreation,
    RetryStrategySuggestion,
}

impl PlannerOperation {
    pub fn tier(self) -> OperationTier {
        use OperationTier::*;
        use PlannerOperation::*;
        match self {
            FeasibilityCheck | ParameterExtraction | DirectAnswerProbe => Simple,
            ResultEvaluation | CrossAttemptComparison | DirectAnswerGeneration => Medium,
            InitialTreeCreation | RetryStrategySuggestion => Complex,
        }
    }
}

#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum RouterError {
    #[error("no provider configured for tier {0:?}")]
    TierUnavailable(OperationTier),
    #[error("LLM call failed: {0}")]
    CallFailed(String),
    #[error("LLM response did not match the expected schema: {0}")]
    MalformedResponse(String),
}

pub type LlmResult<T> = Result<T, RouterError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeasibilityResult {
    pub feasible: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub is_satisfactory: bool,
    pub reason: String,
    pub needs_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryStrategyResult {
    pub should_stop: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_tree: Option<RawTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    pub is_significantly_different: bool,
    pub reason: String,
}

/// Every LLM operation the planner needs, scoped to one acquired client.
/// Implementations default every optional capability to an error so a
/// minimal client (e.g. one backing only SIMPLE-tier calls) only needs to
/// implement what it actually serves — mirroring the default-method
/// pattern the kernel's own provider trait uses.
#[async_trait]
pub trait LLMClient: Send + Sync {
    fn provider_name(&self) -> &str;
    fn model_id(&self) -> &str;

    async fn validate_feasibility(
        &self,
        query: &str,
        catalog: &[CapabilityDescription],
    ) -> LlmResult<FeasibilityResult>;

    async fn create_tree(&self, query: &str, catalog: &[CapabilityDescription]) -> LlmResult<RawTree>;

    async fn extract_parameters(
        &self,
        prior_result_text: &str,
        parameter_schema: &HashMap<String, crate::capability::ParamSpec>,
    ) -> LlmResult<HashMap<String, serde_json::Value>>;

    async fn evaluate_result(
        &self,
        query: &str,
        result_text: &str,
    ) -> LlmResult<EvaluationResult>;

    async fn compare_executions(
        &self,
        query: &str,
        previous_tree_text: &str,
        previous_result: &str,
        current_tree_text: &str,
        current_result: &str,
    ) -> LlmResult<ComparisonResult>;

    async fn suggest_retry(
        &self,
        query: &str,
        history: &ExecutionHistory,
        catalog: &[CapabilityDescription],
    ) -> LlmResult<RetryStrategyResult>;

    /// Default: unsupported. Only providers advertising direct-answer
    /// capability need to implement this.
    async fn can_answer_directly(&self, _query: &str) -> LlmResult<bool> {
        Ok(false)
    }

    /// Default: unsupported.
    async fn generate_direct_answer(&self, _query: &str) -> LlmResult<String> {
        Err(RouterError::CallFailed(format!(
            "provider {} does not support direct answers",
            self.provider_name()
        )))
    }

    /// Default: always healthy. Concrete clients that actually probe a
    /// backend should override this.
    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_tiers_match_the_spec_table() {
        use OperationTier::*;
        use PlannerOperation::*;
        assert_eq!(FeasibilityCheck.tier(), Simple);
        assert_eq!(ParameterExtraction.tier(), Simple);
        assert_eq!(DirectAnswerProbe.tier(), Simple);
        assert_eq!(ResultEvaluation.tier(), Medium);
        assert_eq!(CrossAttemptComparison.tier(), Medium);
        assert_eq!(DirectAnswerGeneration.tier(), Medium);
        assert_eq!(InitialTreeCreation.tier(), Complex);
        assert_eq!(RetryStrategySuggestion.tier(), Complex);
    }

    #[test]
    fn feasibility_result_round_trips_through_json() {
        let r = FeasibilityResult {
            feasible: false,
            reason: "no matching capability".into(),
            suggestion: Some("try capability X".into()),
        };
        let json = serde_json::to_string(&r).unwrap();
        let back: FeasibilityResult = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
