//! Structural snapshots of forest topology for diagnostics and tests.
//!
//! Snapshots capture identities and edges only, never payload values, so
//! they serialize for any `T`. [`crate::Forest::dump_json`] renders them via
//! `serde_json`.

use crate::forest::node::NodeId;
use crate::forest::ForestInner;
use serde::Serialize;

/// Point-in-time structural view of a whole forest.
#[derive(Debug, Clone, Serialize)]
pub struct ForestSnapshot {
    /// Every live tree, in root identity order.
    pub trees: Vec<TreeSnapshot>,
    /// Live node count across all trees.
    pub live_nodes: usize,
    /// Collection policy at snapshot time.
    pub auto_collect: bool,
}

/// One tree: its root and every node reachable over tree edges.
#[derive(Debug, Clone, Serialize)]
pub struct TreeSnapshot {
    /// Identity of the tree's root node.
    pub root: NodeId,
    /// Nodes of this tree in traversal order, root first.
    pub nodes: Vec<NodeSnapshot>,
}

/// One node's identity, tree position, and claim edges.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    /// Stable node identity.
    pub id: NodeId,
    /// Tree parent, absent for roots.
    pub parent: Option<NodeId>,
    /// Tree children.
    pub children: Vec<NodeId>,
    /// Claimants that are not the tree parent.
    pub owned_by: Vec<NodeId>,
    /// Inverse claim view.
    pub owns: Vec<NodeId>,
    /// Live root handles backing this node.
    pub external_roots: usize,
}

pub(crate) fn snapshot<T>(inner: &ForestInner<T>) -> ForestSnapshot {
    let mut trees = Vec::with_capacity(inner.roots.len());
    for tree in inner.roots.values() {
        let mut nodes = Vec::new();
        let mut stack = vec![tree.root];
        while let Some(key) = stack.pop() {
            let Some(node) = inner.arena.get(key) else {
                continue;
            };
            nodes.push(NodeSnapshot {
                id: node.id,
                parent: node.parent.map(|p| inner.node_id(p)),
                children: node.children.iter().map(|&c| inner.node_id(c)).collect(),
                owned_by: node.owned_by.iter().map(|&o| inner.node_id(o)).collect(),
                owns: node.owns.iter().map(|&o| inner.node_id(o)).collect(),
                external_roots: node.external_roots,
            });
            stack.extend(node.children.iter().copied());
        }
        trees.push(TreeSnapshot {
            root: inner.node_id(tree.root),
            nodes,
        });
    }
    ForestSnapshot {
        trees,
        live_nodes: inner.arena.len(),
        auto_collect: inner.auto_collect,
    }
}
