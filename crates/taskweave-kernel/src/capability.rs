//! Capability contract — the unit of executable behavior the planner can
//! place into a plan and the executor can invoke.
//!
//! A capability never mutates its own declared spec after registration; the
//! registry (see [`crate::registry`]) owns the catalog and its description
//! cache.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Describes a single parameter of a capability function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamSpec {
    /// Primitive type name (e.g. "string", "number", "boolean", "object").
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "defaultValue", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

impl ParamSpec {
    pub fn required(param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default_value: None,
        }
    }

    pub fn optional(
        param_type: impl Into<String>,
        description: impl Into<String>,
        default_value: serde_json::Value,
    ) -> Self {
        Self {
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            default_value: Some(default_value),
        }
    }
}

/// Describes a single callable operation on a capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSpec {
    pub description: String,
    #[serde(default)]
    pub parameters: HashMap<String, ParamSpec>,
    #[serde(rename = "returnType", default = "default_return_type")]
    pub return_type: String,
}

fn default_return_type() -> String {
    "string".to_string()
}

/// The registry-facing, serializable self-description of a capability.
///
/// This is what `getAllLayerDescriptions` / the `layer-info` introspection
/// capability returns; it never carries a reference to the executable
/// behavior itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityDescription {
    pub name: String,
    pub description: String,
    pub functions: HashMap<String, FunctionSpec>,
}

impl CapabilityDescription {
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

/// Errors a capability's own invocation can raise. Distinct from
/// [`crate::registry::RegistryError`], which covers registry-level lookup
/// failures (unknown capability, unknown function) rather than failures
/// inside an otherwise-resolved invocation.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CapabilityError {
    #[error("unknown function {function:?} on capability {capability:?}")]
    UnknownFunction { capability: String, function: String },

    #[error("invocation failed: {0}")]
    InvocationFailed(String),

    #[error("invalid argument {name:?}: {reason}")]
    InvalidArgument { name: String, reason: String },
}

/// A unit of executable behavior: local (in-process) or remote (proxied
/// over HTTP). Both share this contract, so the registry and the executor
/// never need to know which kind they are holding.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Stable, unique name. Never changes for the lifetime of a registration.
    fn name(&self) -> &str;

    /// Self-description served to `getAllLayerDescriptions` and the planner.
    fn describe(&self) -> CapabilityDescription;

    /// Invoke `function` with `args`, returning an opaque text result.
    async fn execute(
        &self,
        function: &str,
        args: HashMap<String, serde_json::Value>,
    ) -> Result<String, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_spec_required_has_no_default() {
        let p = ParamSpec::required("string", "the message to echo");
        assert!(p.required);
        assert!(p.default_value.is_none());
    }

    #[test]
    fn param_spec_optional_carries_default() {
        let p = ParamSpec::optional("number", "retry budget", serde_json::json!(3));
        assert!(!p.required);
        assert_eq!(p.default_value, Some(serde_json::json!(3)));
    }

    #[test]
    fn description_function_names_sorted() {
        let mut functions = HashMap::new();
        functions.insert(
            "zeta".to_string(),
            FunctionSpec {
                description: "z".into(),
                parameters: HashMap::new(),
                return_type: "string".into(),
            },
        );
        functions.insert(
            "alpha".to_string(),
            FunctionSpec {
                description: "a".into(),
                parameters: HashMap::new(),
                return_type: "string".into(),
            },
        );
        let desc = CapabilityDescription {
            name: "test".into(),
            description: "test capability".into(),
            functions,
        };
        assert_eq!(desc.function_names(), vec!["alpha", "zeta"]);
        assert!(desc.has_function("alpha"));
        assert!(!desc.has_function("omega"));
    }
}
