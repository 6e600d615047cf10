//! In-process test doubles: capabilities and an LLM client with no network
//! dependency, used by this crate's own tests and by the root integration
//! test crate.
//!
//! Collapsed into a module here rather than its own crate because this
//! workspace has one runtime crate (see `DESIGN.md` for the grounding).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use taskweave_kernel::{
    Capability, CapabilityDescription, CapabilityError, ComparisonResult, EvaluationResult,
    FeasibilityResult, FunctionSpec, LLMClient, LlmResult, ParamSpec, RawTree,
    RetryStrategyResult, RouterError,
};

/// Echoes its `message` argument back verbatim.
pub struct EchoCapability;

#[async_trait]
impl Capability for EchoCapability {
    fn name(&self) -> &str {
        "echo-layer"
    }

    fn describe(&self) -> CapabilityDescription {
        let mut functions = HashMap::new();
        functions.insert(
            "echo".to_string(),
            FunctionSpec {
                description: "echoes back the `message` argument".into(),
                parameters: {
                    let mut p = HashMap::new();
                    p.insert("message".to_string(), ParamSpec::required("string", "text to echo"));
                    p
                },
                return_type: "string".into(),
            },
        );
        CapabilityDescription {
            name: "echo-layer".into(),
            description: "test capability that echoes its input".into(),
            functions,
        }
    }

    async fn execute(
        &self,
        function: &str,
        args: HashMap<String, serde_json::Value>,
    ) -> Result<String, CapabilityError> {
        if function != "echo" {
            return Err(CapabilityError::UnknownFunction {
                capability: "echo-layer".into(),
                function: function.to_string(),
            });
        }
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CapabilityError::InvalidArgument {
                name: "message".into(),
                reason: "must be a string".into(),
            })?;
        Ok(message.to_string())
    }
}

/// Upper-cases its `text` argument. Useful for exercising sequential
/// parameter chaining: feed one node's output as the next node's `text`.
pub struct UppercaseCapability;

#[async_trait]
impl Capability for UppercaseCapability {
    fn name(&self) -> &str {
        "uppercase-layer"
    }

    fn describe(&self) -> CapabilityDescription {
        let mut functions = HashMap::new();
        functions.insert(
            "shout".to_string(),
            FunctionSpec {
                description: "upper-cases the `text` argument".into(),
                parameters: {
                    let mut p = HashMap::new();
                    p.insert("text".to_string(), ParamSpec::required("string", "text to upper-case"));
                    p
                },
                return_type: "string".into(),
            },
        );
        CapabilityDescription {
            name: "uppercase-layer".into(),
            description: "test capability that upper-cases its input".into(),
            functions,
        }
    }

    async fn execute(
        &self,
        function: &str,
        args: HashMap<String, serde_json::Value>,
    ) -> Result<String, CapabilityError> {
        if function != "shout" {
            return Err(CapabilityError::UnknownFunction {
                capability: "uppercase-layer".into(),
                function: function.to_string(),
            });
        }
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CapabilityError::InvalidArgument {
                name: "text".into(),
                reason: "must be a string".into(),
            })?;
        Ok(text.to_uppercase())
    }
}

/// A capability whose `execute` always fails, for exercising retry and
/// failure-propagation paths.
pub struct FailingCapability {
    pub message: String,
}

#[async_trait]
impl Capability for FailingCapability {
    fn name(&self) -> &str {
        "failing-layer"
    }

    fn describe(&self) -> CapabilityDescription {
        let mut functions = HashMap::new();
        functions.insert(
            "fail".to_string(),
            FunctionSpec {
                description: "always fails".into(),
                parameters: HashMap::new(),
                return_type: "string".into(),
            },
        );
        CapabilityDescription {
            name: "failing-layer".into(),
            description: "test capability that always fails".into(),
            functions,
        }
    }

    async fn execute(
        &self,
        _function: &str,
        _args: HashMap<String, serde_json::Value>,
    ) -> Result<String, CapabilityError> {
        Err(CapabilityError::InvocationFailed(self.message.clone()))
    }
}

/// Echoes its `message` argument back after sleeping for a fixed duration —
/// long enough that a test can start its execution and then trigger shutdown
/// teardown while the node is still running.
pub struct SlowCapability {
    pub delay: std::time::Duration,
}

#[async_trait]
impl Capability for SlowCapability {
    fn name(&self) -> &str {
        "slow-layer"
    }

    fn describe(&self) -> CapabilityDescription {
        let mut functions = HashMap::new();
        functions.insert(
            "echo".to_string(),
            FunctionSpec {
                description: "echoes back the `message` argument after a delay".into(),
                parameters: {
                    let mut p = HashMap::new();
                    p.insert("message".to_string(), ParamSpec::required("string", "text to echo"));
                    p
                },
                return_type: "string".into(),
            },
        );
        CapabilityDescription {
            name: "slow-layer".into(),
            description: "test capability that echoes its input after a delay".into(),
            functions,
        }
    }

    async fn execute(
        &self,
        function: &str,
        args: HashMap<String, serde_json::Value>,
    ) -> Result<String, CapabilityError> {
        if function != "echo" {
            return Err(CapabilityError::UnknownFunction {
                capability: "slow-layer".into(),
                function: function.to_string(),
            });
        }
        tokio::time::sleep(self.delay).await;
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CapabilityError::InvalidArgument {
                name: "message".into(),
                reason: "must be a string".into(),
            })?;
        Ok(message.to_string())
    }
}

/// A pre-programmed [`LLMClient`]: each method pops the next queued response
/// off its own `VecDeque`, panicking with a descriptive message if the
/// queue for that operation is empty. This keeps test setups explicit about
/// exactly how many calls they expect, scoped per-operation instead of
/// per-prompt-substring, since the operations here are typed rather than
/// free text.
pub struct ScriptedLlmClient {
    provider_name: String,
    model_id: String,
    feasibility: Mutex<std::collections::VecDeque<LlmResult<FeasibilityResult>>>,
    trees: Mutex<std::collections::VecDeque<LlmResult<RawTree>>>,
    parameters: Mutex<std::collections::VecDeque<LlmResult<HashMap<String, serde_json::Value>>>>,
    evaluations: Mutex<std::collections::VecDeque<LlmResult<EvaluationResult>>>,
    comparisons: Mutex<std::collections::VecDeque<LlmResult<ComparisonResult>>>,
    retries: Mutex<std::collections::VecDeque<LlmResult<RetryStrategyResult>>>,
}

impl ScriptedLlmClient {
    pub fn new(provider_name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            model_id: model_id.into(),
            feasibility: Mutex::new(Default::default()),
            trees: Mutex::new(Default::default()),
            parameters: Mutex::new(Default::default()),
            evaluations: Mutex::new(Default::default()),
            comparisons: Mutex::new(Default::default()),
            retries: Mutex::new(Default::default()),
        }
    }

    pub fn push_feasibility(&self, result: LlmResult<FeasibilityResult>) -> &Self {
        self.feasibility.lock().unwrap().push_back(result);
        self
    }

    pub fn push_tree(&self, result: LlmResult<RawTree>) -> &Self {
        self.trees.lock().unwrap().push_back(result);
        self
    }

    pub fn push_parameters(&self, result: LlmResult<HashMap<String, serde_json::Value>>) -> &Self {
        self.parameters.lock().unwrap().push_back(result);
        self
    }

    pub fn push_evaluation(&self, result: LlmResult<EvaluationResult>) -> &Self {
        self.evaluations.lock().unwrap().push_back(result);
        self
    }

    pub fn push_comparison(&self, result: LlmResult<ComparisonResult>) -> &Self {
        self.comparisons.lock().unwrap().push_back(result);
        self
    }

    pub fn push_retry(&self, result: LlmResult<RetryStrategyResult>) -> &Self {
        self.retries.lock().unwrap().push_back(result);
        self
    }
}

#[async_trait]
impl LLMClient for ScriptedLlmClient {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn validate_feasibility(
        &self,
        _query: &str,
        _catalog: &[CapabilityDescription],
    ) -> LlmResult<FeasibilityResult> {
        self.feasibility
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RouterError::CallFailed("no scripted feasibility response queued".into())))
    }

    async fn create_tree(&self, _query: &str, _catalog: &[CapabilityDescription]) -> LlmResult<RawTree> {
        self.trees
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RouterError::CallFailed("no scripted tree response queued".into())))
    }

    async fn extract_parameters(
        &self,
        _prior_result_text: &str,
        _parameter_schema: &HashMap<String, ParamSpec>,
    ) -> LlmResult<HashMap<String, serde_json::Value>> {
        self.parameters
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RouterError::CallFailed("no scripted parameter response queued".into())))
    }

    async fn evaluate_result(&self, _query: &str, _result_text: &str) -> LlmResult<EvaluationResult> {
        self.evaluations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RouterError::CallFailed("no scripted evaluation response queued".into())))
    }

    async fn compare_executions(
        &self,
        _query: &str,
        _previous_tree_text: &str,
        _previous_result: &str,
        _current_tree_text: &str,
        _current_result: &str,
    ) -> LlmResult<ComparisonResult> {
        self.comparisons
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RouterError::CallFailed("no scripted comparison response queued".into())))
    }

    async fn suggest_retry(
        &self,
        _query: &str,
        _history: &taskweave_kernel::ExecutionHistory,
        _catalog: &[CapabilityDescription],
    ) -> LlmResult<RetryStrategyResult> {
        self.retries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RouterError::CallFailed("no scripted retry response queued".into())))
    }
}
