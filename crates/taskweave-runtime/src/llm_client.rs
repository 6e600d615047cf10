//! HTTP-backed [`LLMClient`]: talks to an OpenAI-compatible structured
//! completion endpoint over `reqwest`, constraining every response to the
//! JSON schema the calling operation expects.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use taskweave_kernel::{
    CapabilityDescription, ComparisonResult, EvaluationResult, ExecutionHistory, FeasibilityResult,
    LLMClient, LlmResult, ParamSpec, RawTree, RetryStrategyResult, RouterError, TierConfig,
};

/// One provider endpoint, bound to a single complexity tier.
///
/// Cheap to clone: the underlying `reqwest::Client` is itself
/// `Arc`-backed, so the router hands out a fresh handle per acquisition
/// without re-establishing connection pools.
#[derive(Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    provider_name: String,
    model_id: String,
    base_url: String,
    api_key: Option<String>,
}

impl HttpLlmClient {
    pub fn new(config: &TierConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        Self {
            http,
            provider_name: config.provider.clone(),
            model_id: config.model_id.clone(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    async fn structured_completion<T: for<'de> Deserialize<'de>>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> LlmResult<T> {
        let body = json!({
            "model": self.model_id,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": schema_name, "schema": schema, "strict": true},
            },
        });

        let mut req = self.http.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| RouterError::CallFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RouterError::CallFailed(format!(
                "{} returned {}",
                self.provider_name,
                response.status()
            )));
        }

        let envelope: ChatCompletionEnvelope = response
            .json()
            .await
            .map_err(|e| RouterError::MalformedResponse(e.to_string()))?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RouterError::MalformedResponse("no choices in completion".into()))?;

        serde_json::from_str(&content).map_err(|e| RouterError::MalformedResponse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ChatCompletionEnvelope {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl LLMClient for HttpLlmClient {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn validate_feasibility(
        &self,
        query: &str,
        catalog: &[CapabilityDescription],
    ) -> LlmResult<FeasibilityResult> {
        let prompt = format!(
            "Query: {query}\nAvailable capabilities: {}",
            catalog_summary(catalog)
        );
        self.structured_completion(
            "Decide whether the available capabilities can satisfy the query.",
            &prompt,
            "feasibility",
            json!({
                "type": "object",
                "properties": {
                    "feasible": {"type": "boolean"},
                    "reason": {"type": "string"},
                    "suggestion": {"type": "string"},
                },
                "required": ["feasible", "reason"],
            }),
        )
        .await
    }

    async fn create_tree(&self, query: &str, catalog: &[CapabilityDescription]) -> LlmResult<RawTree> {
        let names: Vec<&str> = catalog.iter().map(|c| c.name.as_str()).collect();
        let prompt = format!("Query: {query}\nAvailable capabilities: {}", catalog_summary(catalog));
        self.structured_completion(
            "Produce an execution tree using only the listed capability names.",
            &prompt,
            "tree",
            json!({
                "type": "object",
                "properties": {
                    "rootNodes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "layerName": {"type": "string", "enum": names},
                                "function": {"type": "string"},
                                "args": {"type": "object"},
                                "parallel": {"type": "boolean"},
                                "children": {"type": "array"},
                            },
                            "required": ["layerName", "function"],
                        },
                    },
                },
                "required": ["rootNodes"],
            }),
        )
        .await
    }

    async fn extract_parameters(
        &self,
        prior_result_text: &str,
        parameter_schema: &HashMap<String, ParamSpec>,
    ) -> LlmResult<HashMap<String, serde_json::Value>> {
        let prompt = format!(
            "Previous result: {prior_result_text}\nTarget parameters: {}",
            serde_json::to_string(parameter_schema).unwrap_or_default()
        );
        self.structured_completion(
            "Extract the declared parameters from the previous step's text result.",
            &prompt,
            "parameters",
            json!({"type": "object"}),
        )
        .await
    }

    async fn evaluate_result(&self, query: &str, result_text: &str) -> LlmResult<EvaluationResult> {
        let prompt = format!("Query: {query}\nResult: {result_text}");
        self.structured_completion(
            "Decide whether the result satisfies the query.",
            &prompt,
            "evaluation",
            json!({
                "type": "object",
                "properties": {
                    "isSatisfactory": {"type": "boolean"},
                    "reason": {"type": "string"},
                    "needsRetry": {"type": "boolean"},
                },
                "required": ["isSatisfactory", "reason", "needsRetry"],
            }),
        )
        .await
    }

    async fn compare_executions(
        &self,
        query: &str,
        previous_tree_text: &str,
        previous_result: &str,
        current_tree_text: &str,
        current_result: &str,
    ) -> LlmResult<ComparisonResult> {
        let prompt = format!(
            "Query: {query}\nPrevious tree: {previous_tree_text}\nPrevious result: {previous_result}\nCurrent tree: {current_tree_text}\nCurrent result: {current_result}"
        );
        self.structured_completion(
            "Decide whether the current attempt is significantly different from the previous one.",
            &prompt,
            "comparison",
            json!({
                "type": "object",
                "properties": {
                    "isSignificantlyDifferent": {"type": "boolean"},
                    "reason": {"type": "string"},
                },
                "required": ["isSignificantlyDifferent", "reason"],
            }),
        )
        .await
    }

    async fn suggest_retry(
        &self,
        query: &str,
        history: &ExecutionHistory,
        catalog: &[CapabilityDescription],
    ) -> LlmResult<RetryStrategyResult> {
        let prompt = format!(
            "Query: {query}\nFailed history: {}\nAvailable capabilities: {}",
            serde_json::to_string(history).unwrap_or_default(),
            catalog_summary(catalog)
        );
        self.structured_completion(
            "Decide whether to retry and, if so, propose a new execution tree.",
            &prompt,
            "retry_strategy",
            json!({
                "type": "object",
                "properties": {
                    "shouldStop": {"type": "boolean"},
                    "reason": {"type": "string"},
                    "newTree": {"type": "object"},
                },
                "required": ["shouldStop", "reason"],
            }),
        )
        .await
    }

    async fn health_check(&self) -> bool {
        self.http
            .get(format!("{}/models", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

fn catalog_summary(catalog: &[CapabilityDescription]) -> String {
    catalog
        .iter()
        .map(|c| format!("{}({})", c.name, c.function_names().join(",")))
        .collect::<Vec<_>>()
        .join("; ")
}
