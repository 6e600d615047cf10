//! Capability registry contract.
//!
//! Kernel keeps only the trait; [`taskweave_runtime::registry::InMemoryCapabilityRegistry`]
//! is the concrete, in-process implementation. A remote-backed registry
//! (capabilities proxied over HTTP) can implement the same trait without the
//! planner or executor noticing the difference.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::capability::{Capability, CapabilityDescription};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("capability {0:?} is already registered")]
    AlreadyRegistered(String),

    #[error("capability {0:?} not found")]
    NotFound(String),

    #[error("function {function:?} not found on capability {capability:?}")]
    FunctionNotFound { capability: String, function: String },
}

/// Catalog of named capabilities, each self-describing its functions.
///
/// Implementations are expected to cache [`CapabilityDescription`]s and
/// invalidate the cache on register/deregister (kernel does not mandate the
/// caching strategy, only the externally-observable contract).
#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    /// Register a capability. Fails if the name is already taken.
    fn register(&self, capability: Box<dyn Capability>) -> Result<(), RegistryError>;

    /// Remove a previously registered capability.
    fn deregister(&self, name: &str) -> Result<(), RegistryError>;

    /// Deterministic-order list of all registered capability descriptions
    /// (registration order), backing `getAllLayerDescriptions`.
    fn describe_all(&self) -> Vec<CapabilityDescription>;

    /// Look up a single capability's description by name.
    fn describe(&self, name: &str) -> Option<CapabilityDescription>;

    /// True iff a capability of this name is currently registered.
    fn contains(&self, name: &str) -> bool;

    /// Invoke `function` on capability `name`. Registry-level lookup errors
    /// (unknown capability) surface as [`RegistryError`]; invocation-level
    /// failures inside an otherwise-resolved capability surface through the
    /// `Ok(Err(CapabilityError))` path the caller already expects from
    /// `Capability::execute`, which this method simply forwards.
    async fn execute(
        &self,
        name: &str,
        function: &str,
        args: HashMap<String, serde_json::Value>,
    ) -> Result<String, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_messages_name_the_capability() {
        let err = RegistryError::NotFound("weather".into());
        assert_eq!(err.to_string(), "capability \"weather\" not found");

        let err = RegistryError::FunctionNotFound {
            capability: "weather".into(),
            function: "forecast".into(),
        };
        assert!(err.to_string().contains("forecast"));
        assert!(err.to_string().contains("weather"));
    }
}
