//! Kernel: pure data types and trait contracts for the orchestration engine.
//!
//! This crate holds no I/O and no concrete implementations. It defines the
//! plan/execution domain model ([`plan`], [`context`], [`history`]), the
//! seams a runtime must implement ([`registry`], [`llm`], [`router`],
//! [`events`]), the one piece of pure synchronous logic that needs no trait
//! ([`validation`]), and the error/config types shared across both
//! ([`error`], [`config`]).

pub mod capability;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod history;
pub mod llm;
pub mod plan;
pub mod registry;
pub mod router;
pub mod validation;

pub use capability::{Capability, CapabilityDescription, CapabilityError, FunctionSpec, ParamSpec};
pub use config::{OrchestratorConfig, TierConfig};
pub use context::{ExecutionContext, StatusCounts};
pub use error::{ConfigError, ExecutorError, OrchestratorError, OrchestratorResult, PlannerError};
pub use events::{BusError, EventPublisher};
pub use history::{ExecutionHistory, HistorySnapshot, RequestResult, RequestStatus};
pub use llm::{
    ComparisonResult, EvaluationResult, FeasibilityResult, LLMClient, LlmResult, OperationTier,
    PlannerOperation, RetryStrategyResult, RouterError,
};
pub use plan::{ExecutionTree, Node, NodeExecutionResult, NodeRef, NodeStatus, RawNode, RawTree};
pub use registry::{CapabilityRegistry, RegistryError};
pub use router::{ClientLease, LLMTaskRouter, TierReadiness};
pub use validation::{PlanValidator, ValidationError, ValidationOutcome, ValidationWarning, MAX_DEPTH};
