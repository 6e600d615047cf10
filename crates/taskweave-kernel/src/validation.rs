//! Plan Validator: structural validation and best-effort auto-repair of a
//! raw, LLM-produced tree against the live capability catalog.
//!
//! Pure, synchronous logic — no I/O, no trait object. Grounded in the same
//! shape of check the kernel already uses for message-routing graphs:
//! depth/cycle/reachability checks that either pass or explain exactly
//! which invariant broke.

use std::collections::HashMap;

use thiserror::Error;

use crate::capability::CapabilityDescription;
use crate::plan::{ExecutionTree, Node, RawTree};

pub const MAX_DEPTH: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("tree depth {actual} exceeds maximum of {max}")]
    DepthExceeded { max: usize, actual: usize },

    #[error("cycle detected: capability/function pair repeats on path {path:?}")]
    CycleDetected { path: Vec<String> },

    #[error("tree has no root nodes")]
    EmptyTree,

    #[error("capability {requested:?} referenced by node {node_id} has no match in an empty catalog")]
    NoCapabilitiesToSubstitute { node_id: String, requested: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationWarning {
    CapabilitySubstituted {
        node_id: String,
        requested: String,
        substituted: String,
    },
    FunctionSubstituted {
        node_id: String,
        capability: String,
        requested: String,
        substituted: String,
    },
    TrivialParallelism {
        node_id: String,
    },
}

/// Result of validating (and possibly repairing) a raw tree.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub fixed_tree: Option<ExecutionTree>,
}

/// Validates and repairs raw trees against a capability catalog snapshot.
pub struct PlanValidator<'a> {
    catalog: &'a [CapabilityDescription],
}

impl<'a> PlanValidator<'a> {
    pub fn new(catalog: &'a [CapabilityDescription]) -> Self {
        Self { catalog }
    }

    /// Validate `raw`, assigning ids and repairing capability/function
    /// references where possible. Hard errors (depth, cycle, or a name that
    /// cannot be repaired because the catalog is empty) leave `fixed_tree`
    /// as `None`.
    pub fn validate_and_fix(&self, name: &str, raw: &RawTree) -> ValidationOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if raw.root_nodes.is_empty() {
            errors.push(ValidationError::EmptyTree);
            return ValidationOutcome {
                is_valid: false,
                errors,
                warnings,
                fixed_tree: None,
            };
        }

        let mut tree = ExecutionTree::assign_ids(name, raw);

        let depth = tree.depth();
        if depth > MAX_DEPTH {
            errors.push(ValidationError::DepthExceeded {
                max: MAX_DEPTH,
                actual: depth,
            });
        }

        for root in &tree.roots {
            if let Some(path) = find_cycle(root, &mut Vec::new()) {
                errors.push(ValidationError::CycleDetected { path });
            }
        }

        if !errors.is_empty() {
            return ValidationOutcome {
                is_valid: false,
                errors,
                warnings,
                fixed_tree: None,
            };
        }

        let by_name: HashMap<&str, &CapabilityDescription> =
            self.catalog.iter().map(|c| (c.name.as_str(), c)).collect();

        for root in &mut tree.roots {
            repair_node(root, self.catalog, &by_name, &mut warnings, &mut errors);
        }

        if !errors.is_empty() {
            return ValidationOutcome {
                is_valid: false,
                errors,
                warnings,
                fixed_tree: None,
            };
        }

        ValidationOutcome {
            is_valid: true,
            errors,
            warnings,
            fixed_tree: Some(tree),
        }
    }
}

/// Finds the first repeated `(capability, function)` pair on a root-to-leaf
/// path, returning the offending path as `"capability.function"` strings.
fn find_cycle(node: &Node, path: &mut Vec<String>) -> Option<Vec<String>> {
    let key = format!("{}.{}", node.capability, node.function);
    if path.contains(&key) {
        path.push(key);
        return Some(path.clone());
    }
    path.push(key);
    for child in &node.children {
        if let Some(cycle) = find_cycle(child, path) {
            return Some(cycle);
        }
    }
    path.pop();
    None
}

fn repair_node(
    node: &mut Node,
    catalog: &[CapabilityDescription],
    by_name: &HashMap<&str, &CapabilityDescription>,
    warnings: &mut Vec<ValidationWarning>,
    errors: &mut Vec<ValidationError>,
) {
    if !by_name.contains_key(node.capability.as_str()) {
        match find_capability_match(&node.capability, catalog) {
            Some(substituted) => {
                warnings.push(ValidationWarning::CapabilitySubstituted {
                    node_id: node.id.clone(),
                    requested: node.capability.clone(),
                    substituted: substituted.clone(),
                });
                node.capability = substituted;
            }
            None => {
                errors.push(ValidationError::NoCapabilitiesToSubstitute {
                    node_id: node.id.clone(),
                    requested: node.capability.clone(),
                });
                return;
            }
        }
    }

    if let Some(desc) = by_name
        .get(node.capability.as_str())
        .copied()
        .or_else(|| catalog.iter().find(|c| c.name == node.capability))
    {
        if !desc.has_function(&node.function) {
            if let Some(first) = desc.function_names().first() {
                warnings.push(ValidationWarning::FunctionSubstituted {
                    node_id: node.id.clone(),
                    capability: node.capability.clone(),
                    requested: node.function.clone(),
                    substituted: (*first).to_string(),
                });
                node.function = (*first).to_string();
            }
        }
    }

    if node.parallel && node.children.len() < 2 {
        warnings.push(ValidationWarning::TrivialParallelism {
            node_id: node.id.clone(),
        });
    }

    for child in &mut node.children {
        repair_node(child, catalog, by_name, warnings, errors);
    }
}

/// Exact match, then case-insensitive, then substring — in that order.
fn find_capability_match(requested: &str, catalog: &[CapabilityDescription]) -> Option<String> {
    if catalog.is_empty() {
        return None;
    }
    if let Some(c) = catalog.iter().find(|c| c.name == requested) {
        return Some(c.name.clone());
    }
    let lower = requested.to_lowercase();
    if let Some(c) = catalog.iter().find(|c| c.name.to_lowercase() == lower) {
        return Some(c.name.clone());
    }
    if let Some(c) = catalog
        .iter()
        .find(|c| c.name.to_lowercase().contains(&lower) || lower.contains(&c.name.to_lowercase()))
    {
        return Some(c.name.clone());
    }
    Some(catalog[0].name.clone())
}
