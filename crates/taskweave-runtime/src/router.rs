//! Default [`LLMTaskRouter`]: one [`HttpLlmClient`] per tier, built once
//! from [`OrchestratorConfig`] at startup.

use async_trait::async_trait;
use taskweave_kernel::{
    ClientLease, LLMTaskRouter, LlmResult, OperationTier, OrchestratorConfig, RouterError,
    TierReadiness,
};

use crate::llm_client::HttpLlmClient;

/// Router over statically-configured, per-tier HTTP clients.
///
/// "Select" here hands out a clone of the tier's client rather than
/// pooling a fixed set of connections — `HttpLlmClient` is cheap to clone
/// (its `reqwest::Client` is `Arc`-backed internally), so this satisfies
/// the "fresh or pooled" contract without a checkout/release protocol: the
/// lease is simply dropped when the caller is done with it.
pub struct DefaultLLMTaskRouter {
    simple: HttpLlmClient,
    medium: HttpLlmClient,
    complex: HttpLlmClient,
}

impl DefaultLLMTaskRouter {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            simple: HttpLlmClient::new(&config.simple),
            medium: HttpLlmClient::new(&config.medium),
            complex: HttpLlmClient::new(&config.complex),
        }
    }

    fn client_for(&self, tier: OperationTier) -> &HttpLlmClient {
        match tier {
            OperationTier::Simple => &self.simple,
            OperationTier::Medium => &self.medium,
            OperationTier::Complex => &self.complex,
        }
    }
}

#[async_trait]
impl LLMTaskRouter for DefaultLLMTaskRouter {
    async fn select_for_tier(&self, tier: OperationTier) -> LlmResult<ClientLease> {
        let client = self.client_for(tier);
        if client.model_id().is_empty() {
            return Err(RouterError::TierUnavailable(tier));
        }
        Ok(Box::new(client.clone()))
    }

    async fn readiness(&self) -> Vec<TierReadiness> {
        let mut out = Vec::with_capacity(3);
        for (tier, client) in [
            (OperationTier::Simple, &self.simple),
            (OperationTier::Medium, &self.medium),
            (OperationTier::Complex, &self.complex),
        ] {
            let ready = client.health_check().await;
            out.push(TierReadiness {
                tier,
                provider: client.provider_name().to_string(),
                model_id: client.model_id().to_string(),
                ready,
                reason: if ready { None } else { Some("health check failed".to_string()) },
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OrchestratorConfig {
        let mut cfg = OrchestratorConfig::default();
        cfg.simple.model_id = "simple-model".into();
        cfg.medium.model_id = "medium-model".into();
        cfg.complex.model_id = "complex-model".into();
        cfg
    }

    #[tokio::test]
    async fn select_for_tier_returns_the_right_model() {
        let router = DefaultLLMTaskRouter::new(&config());
        let client = router.select_for_tier(OperationTier::Complex).await.unwrap();
        assert_eq!(client.model_id(), "complex-model");
    }

    #[tokio::test]
    async fn unconfigured_tier_is_reported_unavailable() {
        let router = DefaultLLMTaskRouter::new(&OrchestratorConfig::default());
        let err = router.select_for_tier(OperationTier::Simple).await.unwrap_err();
        assert!(matches!(err, RouterError::TierUnavailable(OperationTier::Simple)));
    }
}
