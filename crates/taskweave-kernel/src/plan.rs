//! The plan data model: the wire-shaped [`RawTree`] an LLM produces, the
//! id-assigned, immutable [`ExecutionTree`] the rest of the system works
//! with, and the per-attempt [`NodeExecutionResult`] that records what
//! happened to one node.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node exactly as an LLM emits it: no id, capability referenced by
/// `layerName` (the wire name for a capability in the tree schema).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawNode {
    #[serde(rename = "layerName")]
    pub layer_name: String,
    pub function: String,
    #[serde(default)]
    pub args: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub children: Vec<RawNode>,
}

/// A raw, unvalidated plan as produced by the tree-creation or
/// retry-strategy LLM call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawTree {
    #[serde(rename = "rootNodes")]
    pub root_nodes: Vec<RawNode>,
}

/// One node of a validated, id-assigned [`ExecutionTree`].
///
/// `parallel` describes how *this node's children* run relative to one
/// another, not how this node itself runs relative to its siblings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    pub capability: String,
    pub function: String,
    pub args: HashMap<String, serde_json::Value>,
    pub children: Vec<Node>,
    pub parallel: bool,
}

impl Node {
    /// Depth of the subtree rooted at `self`, counting `self` as depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Node::depth)
            .max()
            .unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// Depth-first iterator yielding `(node, parent_id, depth)`, depth
    /// starting at 1 for roots. Used by the executor and by context
    /// bootstrapping — both need every node reachable from the tree.
    pub fn walk<'a>(&'a self, parent_id: Option<&'a str>, depth: usize, out: &mut Vec<(&'a Node, Option<&'a str>, usize)>) {
        out.push((self, parent_id, depth));
        for child in &self.children {
            child.walk(Some(self.id.as_str()), depth + 1, out);
        }
    }
}

/// An immutable, possibly multi-rooted plan ready for validation/execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionTree {
    pub name: String,
    pub roots: Vec<Node>,
}

impl ExecutionTree {
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(Node::node_count).sum()
    }

    pub fn depth(&self) -> usize {
        self.roots.iter().map(Node::depth).max().unwrap_or(0)
    }

    /// All nodes reachable from any root, with parent id and depth.
    pub fn all_nodes(&self) -> Vec<(&Node, Option<&str>, usize)> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.walk(None, 1, &mut out);
        }
        out
    }

    /// Assign deterministic, path-based ids to a raw tree: root index, then
    /// child index, joined by `-` (e.g. `n1-0-2`). Re-running this on the
    /// same [`RawTree`] always produces the same ids.
    pub fn assign_ids(name: impl Into<String>, raw: &RawTree) -> ExecutionTree {
        fn build(raw: &RawNode, path: &str) -> Node {
            let children = raw
                .children
                .iter()
                .enumerate()
                .map(|(i, c)| build(c, &format!("{path}-{i}")))
                .collect();
            Node {
                id: path.to_string(),
                capability: raw.layer_name.clone(),
                function: raw.function.clone(),
                args: raw.args.clone(),
                children,
                parallel: raw.parallel,
            }
        }

        let roots = raw
            .root_nodes
            .iter()
            .enumerate()
            .map(|(i, r)| build(r, &format!("n{i}")))
            .collect();

        ExecutionTree {
            name: name.into(),
            roots,
        }
    }
}

/// Lifecycle state of a single node's outcome for one execution attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
    Retrying,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Lightweight, non-recursive snapshot of the node a [`NodeExecutionResult`]
/// refers to — `capability`/`function`/`args`/`parallel` only, never
/// `children` (those have their own results; embedding the full subtree
/// here would duplicate the whole tree on every leaf).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRef {
    pub capability: String,
    pub function: String,
    pub args: HashMap<String, serde_json::Value>,
    pub parallel: bool,
}

impl From<&Node> for NodeRef {
    fn from(node: &Node) -> Self {
        Self {
            capability: node.capability.clone(),
            function: node.function.clone(),
            args: node.args.clone(),
            parallel: node.parallel,
        }
    }
}

/// One record of what happened to one node on one attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeExecutionResult {
    pub node_id: String,
    pub node: NodeRef,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_node_id: Option<String>,
}

impl NodeExecutionResult {
    pub fn pending(node: &Node, parent_node_id: Option<String>, depth: usize, now: DateTime<Utc>) -> Self {
        Self {
            node_id: node.id.clone(),
            node: NodeRef::from(node),
            status: NodeStatus::Pending,
            result: None,
            error: None,
            timestamp: now,
            retry_count: 0,
            depth,
            parent_node_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str) -> RawNode {
        RawNode {
            layer_name: "echo-layer".into(),
            function: "echo".into(),
            args: HashMap::new(),
            parallel: false,
            children: vec![],
        }
        .with_id_hint(id)
    }

    // Test-only helper: RawNode carries no id, so tests identify nodes by
    // stashing a marker in `args` instead.
    impl RawNode {
        fn with_id_hint(mut self, hint: &str) -> Self {
            self.args.insert("__hint".into(), serde_json::json!(hint));
            self
        }
    }

    #[test]
    fn assign_ids_is_deterministic_and_path_based() {
        let raw = RawTree {
            root_nodes: vec![RawNode {
                layer_name: "a".into(),
                function: "f".into(),
                args: HashMap::new(),
                parallel: false,
                children: vec![leaf("c0"), leaf("c1")],
            }],
        };
        let tree = ExecutionTree::assign_ids("t", &raw);
        assert_eq!(tree.roots[0].id, "n0");
        assert_eq!(tree.roots[0].children[0].id, "n0-0");
        assert_eq!(tree.roots[0].children[1].id, "n0-1");

        let tree2 = ExecutionTree::assign_ids("t", &raw);
        assert_eq!(tree, tree2);
    }

    #[test]
    fn depth_counts_root_as_one() {
        let leaf = Node {
            id: "n0-0".into(),
            capability: "a".into(),
            function: "f".into(),
            args: HashMap::new(),
            children: vec![],
            parallel: false,
        };
        let root = Node {
            id: "n0".into(),
            capability: "a".into(),
            function: "f".into(),
            args: HashMap::new(),
            children: vec![leaf],
            parallel: false,
        };
        assert_eq!(root.depth(), 2);
        assert_eq!(root.node_count(), 2);
    }

    #[test]
    fn all_nodes_reports_parent_and_depth() {
        let tree = ExecutionTree::assign_ids(
            "t",
            &RawTree {
                root_nodes: vec![RawNode {
                    layer_name: "a".into(),
                    function: "f".into(),
                    args: HashMap::new(),
                    parallel: true,
                    children: vec![leaf("x")],
                }],
            },
        );
        let nodes = tree.all_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].1, None);
        assert_eq!(nodes[0].2, 1);
        assert_eq!(nodes[1].1, Some("n0"));
        assert_eq!(nodes[1].2, 2);
    }

    #[test]
    fn node_status_terminal_classification() {
        assert!(NodeStatus::Success.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
        assert!(NodeStatus::Skipped.is_terminal());
        assert!(!NodeStatus::Running.is_terminal());
        assert!(!NodeStatus::Pending.is_terminal());
        assert!(NodeStatus::Success.is_success());
        assert!(!NodeStatus::Failed.is_success());
    }
}
