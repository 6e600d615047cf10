//! In-process [`CapabilityRegistry`] plus the built-in introspection
//! capability every registry exposes.
//!
//! A single `RwLock`-guarded map, register/unregister/get by name, with a
//! describe-all path that callers
//! use to build the planner's catalog snapshot. Capabilities are stored
//! behind `Arc` so `execute` can clone the handle out, drop the lock, and
//! await the invocation without holding the registry lock for the duration
//! of a (possibly slow, possibly remote) capability call.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use taskweave_kernel::{
    Capability, CapabilityDescription, CapabilityError, CapabilityRegistry, FunctionSpec,
    ParamSpec, RegistryError,
};

struct Inner {
    capabilities: RwLock<HashMap<String, Arc<dyn Capability>>>,
    order: RwLock<Vec<String>>,
}

impl Inner {
    fn describe_all(&self) -> Vec<CapabilityDescription> {
        let caps = self.capabilities.read().unwrap();
        self.order
            .read()
            .unwrap()
            .iter()
            .filter_map(|name| caps.get(name).map(|c| c.describe()))
            .collect()
    }

    fn describe(&self, name: &str) -> Option<CapabilityDescription> {
        self.capabilities.read().unwrap().get(name).map(|c| c.describe())
    }
}

/// Thread-safe, in-process capability catalog.
///
/// Insertion order is preserved (a `Vec` of names alongside the map) so
/// `describe_all` is deterministic, which the planner's capability catalog
/// cache depends on for stable prompts.
pub struct InMemoryCapabilityRegistry {
    inner: Arc<Inner>,
}

impl InMemoryCapabilityRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                capabilities: RwLock::new(HashMap::new()),
                order: RwLock::new(Vec::new()),
            }),
        }
    }

    /// A registry pre-populated with the built-in `layer-info` introspection
    /// capability, which every deployment needs so the planner can ask the
    /// registry about itself the same way it asks about any other layer.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let layer_info = LayerInfoCapability { registry: Arc::downgrade(&registry.inner) };
        registry
            .register(Box::new(layer_info))
            .expect("layer-info is the first registration and cannot collide");
        registry
    }

    fn insert(&self, name: String, capability: Arc<dyn Capability>) -> Result<(), RegistryError> {
        let mut caps = self.inner.capabilities.write().unwrap();
        if caps.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        caps.insert(name.clone(), capability);
        self.inner.order.write().unwrap().push(name);
        Ok(())
    }
}

impl Default for InMemoryCapabilityRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl CapabilityRegistry for InMemoryCapabilityRegistry {
    fn register(&self, capability: Box<dyn Capability>) -> Result<(), RegistryError> {
        let name = capability.name().to_string();
        self.insert(name, Arc::from(capability))
    }

    fn deregister(&self, name: &str) -> Result<(), RegistryError> {
        let mut caps = self.inner.capabilities.write().unwrap();
        if caps.remove(name).is_none() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        self.inner.order.write().unwrap().retain(|n| n != name);
        Ok(())
    }

    fn describe_all(&self) -> Vec<CapabilityDescription> {
        self.inner.describe_all()
    }

    fn describe(&self, name: &str) -> Option<CapabilityDescription> {
        self.inner.describe(name)
    }

    fn contains(&self, name: &str) -> bool {
        self.inner.capabilities.read().unwrap().contains_key(name)
    }

    async fn execute(
        &self,
        name: &str,
        function: &str,
        args: HashMap<String, serde_json::Value>,
    ) -> Result<String, RegistryError> {
        let capability = {
            let caps = self.inner.capabilities.read().unwrap();
            caps.get(name).cloned()
        }
        .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        if !capability.describe().has_function(function) {
            return Err(RegistryError::FunctionNotFound {
                capability: name.to_string(),
                function: function.to_string(),
            });
        }

        match capability.execute(function, args).await {
            Ok(result) => Ok(result),
            Err(CapabilityError::UnknownFunction { capability, function }) => {
                Err(RegistryError::FunctionNotFound { capability, function })
            }
            Err(other) => Err(RegistryError::NotFound(format!("{name}: {other}"))),
        }
    }
}

/// Built-in introspection capability, registered by default in every
/// [`InMemoryCapabilityRegistry`]. Holds a weak handle back to the registry
/// it was registered into so `listLayers`/`getLayerInfo` can answer from the
/// live catalog instead of a snapshot taken at registration time.
struct LayerInfoCapability {
    registry: Weak<Inner>,
}

#[async_trait]
impl Capability for LayerInfoCapability {
    fn name(&self) -> &str {
        "layer-info"
    }

    fn describe(&self) -> CapabilityDescription {
        let mut functions = HashMap::new();
        functions.insert(
            "listLayers".to_string(),
            FunctionSpec {
                description: "List the names of every registered capability".into(),
                parameters: HashMap::new(),
                return_type: "string".into(),
            },
        );
        functions.insert(
            "getLayerInfo".to_string(),
            FunctionSpec {
                description: "Describe one registered capability by name".into(),
                parameters: {
                    let mut p = HashMap::new();
                    p.insert("name".to_string(), ParamSpec::required("string", "capability name to look up"));
                    p
                },
                return_type: "string".into(),
            },
        );
        CapabilityDescription {
            name: "layer-info".into(),
            description: "Introspection over the live capability catalog".into(),
            functions,
        }
    }

    async fn execute(
        &self,
        function: &str,
        args: HashMap<String, serde_json::Value>,
    ) -> Result<String, CapabilityError> {
        let inner = self.registry.upgrade().ok_or_else(|| {
            CapabilityError::InvocationFailed("registry has been dropped".into())
        })?;

        match function {
            "listLayers" => {
                let names: Vec<String> = inner.describe_all().into_iter().map(|d| d.name).collect();
                Ok(serde_json::to_string(&names).expect("string vec always serializes"))
            }
            "getLayerInfo" => {
                let name = args
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CapabilityError::InvalidArgument {
                        name: "name".into(),
                        reason: "missing or not a string".into(),
                    })?;
                let description = inner.describe(name).ok_or_else(|| {
                    CapabilityError::InvocationFailed(format!("no such layer: {name}"))
                })?;
                Ok(serde_json::to_string(&description).expect("CapabilityDescription always serializes"))
            }
            other => Err(CapabilityError::UnknownFunction {
                capability: "layer-info".into(),
                function: other.to_string(),
            }),
        }
    }
}
