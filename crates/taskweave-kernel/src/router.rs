//! LLM Task Router contract: maps a tagged planner operation to a scoped
//! [`crate::llm::LLMClient`].

use async_trait::async_trait;

use crate::llm::{LLMClient, LlmResult, OperationTier};

/// A lease on an acquired [`LLMClient`]. Dropping it releases the client
/// back to the router (or, for a pooled router, back to the pool) on every
/// exit path — success, error, or cancellation — because the guard's
/// lifetime is tied to the scope that asked for it, not to an explicit
/// `release()` call the caller could forget.
pub type ClientLease = Box<dyn LLMClient>;

#[async_trait]
pub trait LLMTaskRouter: Send + Sync {
    /// Acquire a client appropriate for `tier`.
    async fn select_for_tier(&self, tier: OperationTier) -> LlmResult<ClientLease>;

    /// Per-tier readiness, backing the `LLM readiness` external interface.
    async fn readiness(&self) -> Vec<TierReadiness>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierReadiness {
    pub tier: OperationTier,
    pub provider: String,
    pub model_id: String,
    pub ready: bool,
    pub reason: Option<String>,
}
