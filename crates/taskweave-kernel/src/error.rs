//! Crate-level error type for `taskweave-kernel`.
//!
//! Provides a unified [`OrchestratorError`] that composes each sub-module's
//! typed error together with [`error_stack::Report`] for rich,
//! context-carrying propagation across component boundaries.
//!
//! # Usage
//!
//! ```rust,ignore
//! use taskweave_kernel::error::{OrchestratorError, OrchestratorResult};
//! use error_stack::ResultExt;
//!
//! fn load(path: &str) -> OrchestratorResult<String> {
//!     std::fs::read_to_string(path)
//!         .map_err(OrchestratorError::from)
//!         .map_err(error_stack::Report::new)
//!         .attach_printable_lazy(|| format!("loading {path}"))
//! }
//! ```

use thiserror::Error;

use crate::events::BusError;
use crate::llm::RouterError;
use crate::registry::RegistryError;
use crate::validation::ValidationError;

/// Node-level execution failure, surfaced by the tree executor. Does not
/// propagate as a panic or `Result::Err` out of `execute_tree` itself — a
/// node failure is recorded as a `NodeExecutionResult` with `status=Failed`;
/// this type exists so the planner can name *why* in its own logs and in
/// `OrchestratorError::Executor` conversions.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ExecutorError {
    #[error("capability {0:?} not found at execution time")]
    CapabilityNotFound(String),
    #[error("capability invocation failed: {0}")]
    InvocationFailed(String),
    #[error("parameter extraction failed for node {node_id}: {reason}")]
    ParameterExtractionFailed { node_id: String, reason: String },
}

/// Planner-level terminal failure, one variant per named error kind a
/// request can end in.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum PlannerError {
    #[error("request judged infeasible: {reason}{}", suggestion.as_ref().map(|s| format!(" (suggestion: {s})")).unwrap_or_default())]
    FeasibilityDenied { reason: String, suggestion: Option<String> },
    #[error("plan creation failed: {0}")]
    PlanCreationFailed(String),
    #[error("plan validation failed: {0}")]
    PlanValidationFailed(#[from] ValidationError),
    #[error("no significant progress between attempts")]
    NoSignificantProgress,
    #[error("retry strategy unavailable: {0}")]
    RetryStrategyUnavailable(String),
    #[error("maximum attempts reached")]
    MaxAttemptsReached,
}

/// Crate-level error type for `taskweave-kernel`.
///
/// Wraps each sub-module's typed error via `#[from]` so the `?` operator
/// converts automatically. Use [`error_stack::Report<OrchestratorError>`]
/// (via [`OrchestratorResult`]) to attach human-readable breadcrumbs as the
/// error crosses component boundaries (planner calling validator/executor).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// A capability registry error (duplicate registration, unknown name).
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A plan validation error (depth, cycle, unrepairable reference).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An LLM task router error (unavailable tier, provider failure).
    #[error("router error: {0}")]
    Router(#[from] RouterError),

    /// A tree-executor error (missing capability, invocation, extraction).
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// A planner-level terminal failure.
    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    /// An event bus error.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// A configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal / untyped error described by a message string.
    #[error("{0}")]
    Internal(String),
}

/// Configuration-related error, kept in the crate error enum because it has
/// no home of its own (the loader lives in the runtime crate, but the typed
/// shape of its failure belongs with the rest of the taxonomy).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Convenience result alias using [`error_stack::Report`].
pub type OrchestratorResult<T> = Result<T, error_stack::Report<OrchestratorError>>;
