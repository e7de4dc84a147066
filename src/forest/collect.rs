//! Reparenting and collection — the lifetime resolution half of the forest.
//!
//! Liveness never depends on walking the (possibly cyclic) application-level
//! reference graph. A tree is alive iff its root carries a live root handle;
//! a node that loses its last root handle is either re-anchored under a
//! surviving claimant (promoting one auxiliary claim edge to the real
//! tree-parent edge) or its subtree is garbage. Cycle edges live in
//! `owns`/`owned_by`, outside the tree topology, so no traversal here ever
//! follows a cycle.
//!
//! Every traversal is an explicit worklist; subtrees are detached bottom-up
//! (children before parents) and payload drops are deferred through the
//! forest's destroy queue, so chains tens of thousands of nodes deep tear
//! down in constant stack space.

use super::node::{remove_edge_instance, NodeKey};
use super::{ForestInner, Tree};
use std::collections::HashSet;
use tracing::trace;

impl<T> ForestInner<T> {
    /// Drops one external root unit from `key`; on the last one, re-anchors
    /// the node under a surviving claimant or marks its subtree orphaned.
    pub(crate) fn release_root(&mut self, key: NodeKey) {
        let Some(node) = self.arena.get_mut(key) else {
            return;
        };
        debug_assert!(node.external_roots > 0, "root release without live root");
        node.external_roots = node.external_roots.saturating_sub(1);
        if node.external_roots > 0 {
            return;
        }
        trace!(node = %node.id, "last root handle released");
        self.anchor_or_orphan(key);
    }

    /// Removes one claim edge instance `origin -> target`.
    ///
    /// Secondary edges are consumed before the promoted tree edge, so a node
    /// claimed twice by the same origin keeps its parent until the last of
    /// those claims is released. Severing the promoted edge forces the node
    /// to re-anchor.
    pub(crate) fn release_claim(&mut self, origin: NodeKey, target: NodeKey) {
        let Some(node) = self.arena.get_mut(target) else {
            return;
        };
        if remove_edge_instance(&mut node.owned_by, origin) {
            if let Some(owner) = self.arena.get_mut(origin) {
                remove_edge_instance(&mut owner.owns, target);
            }
            return;
        }

        // The claim this handle recorded was promoted to the tree edge.
        if self.arena.get(target).is_some_and(|n| n.parent == Some(origin)) {
            self.arena.get_mut(target).expect("target alive").parent = None;
            if let Some(owner) = self.arena.get_mut(origin) {
                remove_edge_instance(&mut owner.children, target);
            }
            // Parentless again: the node heads its own tree until re-anchored.
            let id = self.node_id(target);
            self.roots.insert(id, Tree { root: target });
            trace!(node = %id, "promoted claim severed");
            self.anchor_or_orphan(target);
        }
    }

    /// Resolves a parentless node with no external roots: promote a claimant
    /// or treat the subtree as garbage.
    ///
    /// With auto-collect off the subtree stays registered as a pending tree;
    /// a later claim may still re-anchor it before the next sweep.
    fn anchor_or_orphan(&mut self, key: NodeKey) {
        if let Some(claimant) = self.eligible_claimant(key) {
            self.promote(key, claimant);
        } else if self.auto_collect {
            self.free_subtree(key);
        }
    }

    /// First-registered claimant that can become the node's tree parent:
    /// alive, not the node itself, and not inside the node's own subtree
    /// (a claimant below the node would cycle the tree — a subtree kept
    /// alive only from within is garbage, not anchored).
    pub(crate) fn eligible_claimant(&self, key: NodeKey) -> Option<NodeKey> {
        let node = self.arena.get(key)?;
        node.owned_by
            .iter()
            .copied()
            .find(|&candidate| {
                candidate != key
                    && self.arena.get(candidate).is_some()
                    && !self.is_descendant(candidate, key)
            })
    }

    /// Walks tree-parent edges up from `key`; true when `ancestor` is hit.
    /// Terminates because tree edges are acyclic by construction.
    fn is_descendant(&self, key: NodeKey, ancestor: NodeKey) -> bool {
        let mut cursor = key;
        while let Some(node) = self.arena.get(cursor) {
            match node.parent {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
        false
    }

    /// Promotes one claim edge `claimant -> target` to the real tree-parent
    /// edge, moving `target` and its whole subtree into the claimant's tree.
    /// Remaining claimants stay recorded as secondary edges.
    pub(crate) fn promote(&mut self, target: NodeKey, claimant: NodeKey) {
        let target_id = {
            let node = self.arena.get_mut(target).expect("promote target alive");
            debug_assert!(node.parent.is_none(), "promote target must be a root");
            remove_edge_instance(&mut node.owned_by, claimant);
            node.parent = Some(claimant);
            node.id
        };
        {
            let owner = self.arena.get_mut(claimant).expect("claimant alive");
            remove_edge_instance(&mut owner.owns, target);
            owner.children.push(target);
        }
        self.roots.remove(&target_id);
        if self.debug {
            let claimant_id = self.node_id(claimant);
            tracing::debug!(node = %target_id, parent = %claimant_id, "reparented under claimant");
        }
    }

    /// Pre-order walk of the tree hanging from `root` in its current shape.
    fn subtree_preorder(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if let Some(node) = self.arena.get(key) {
                order.push(key);
                stack.extend(node.children.iter().copied());
            }
        }
        order
    }

    /// Frees the tree rooted at `root`: detaches bookkeeping bottom-up and
    /// tombstones every payload into the destroy queue.
    ///
    /// Nodes inside the dying tree that are claimed from outside it are not
    /// garbage: each such node is reparented out under its claimant, taking
    /// its own subtree along. Rescues repeat to a fixpoint because moving a
    /// subtree out can expose an outside claimant for what remains — up to
    /// and including `root` itself, in which case nothing is freed.
    ///
    /// Claim edges crossing out of the freed set are severed symmetrically,
    /// so no surviving node is left holding an edge into freed storage.
    pub(crate) fn free_subtree(&mut self, root: NodeKey) {
        let mut order = self.subtree_preorder(root);
        loop {
            let doomed: HashSet<NodeKey> = order.iter().copied().collect();
            let rescue = order.iter().find_map(|&key| {
                let node = self.arena.get(key)?;
                node.owned_by
                    .iter()
                    .copied()
                    .find(|&c| c != key && !doomed.contains(&c) && self.arena.get(c).is_some())
                    .map(|claimant| (key, claimant))
            });
            let Some((key, claimant)) = rescue else {
                break;
            };

            // Detach from the dying tree and hand the node (with its own
            // subtree) to the outside claimant. The severed tree edge still
            // has a live claim handle behind it, so it demotes back to a
            // secondary edge rather than vanishing.
            if let Some(parent) = self.arena.get(key).and_then(|n| n.parent) {
                if let Some(parent_node) = self.arena.get_mut(parent) {
                    remove_edge_instance(&mut parent_node.children, key);
                    parent_node.owns.push(key);
                }
                let node = self.arena.get_mut(key).expect("rescued node alive");
                node.parent = None;
                node.owned_by.push(parent);
            }
            self.promote(key, claimant);
            if self.arena.get(root).map_or(true, |r| r.parent.is_some()) {
                // The root itself was rescued; the whole tree lives.
                return;
            }
            order = self.subtree_preorder(root);
        }

        // Reverse pre-order frees children before parents.
        for &key in order.iter().rev() {
            let Some(mut node) = self.arena.remove(key) else {
                continue;
            };
            for owner in node.owned_by.drain(..) {
                if owner == key {
                    continue;
                }
                if let Some(owner_node) = self.arena.get_mut(owner) {
                    remove_edge_instance(&mut owner_node.owns, key);
                }
            }
            for target in node.owns.drain(..) {
                if target == key {
                    continue;
                }
                if let Some(target_node) = self.arena.get_mut(target) {
                    remove_edge_instance(&mut target_node.owned_by, key);
                }
            }
            self.roots.remove(&node.id);
            trace!(node = %node.id, "node freed");
            if let Some(value) = node.value.take() {
                self.destroy.push_back(value);
            }
        }
    }

    /// Full sweep: every registered tree root without a live root handle is either
    /// re-anchored under an eligible claimant or freed with its subtree.
    /// Returns the number of nodes freed.
    ///
    /// One pass suffices: freeing a tree severs the claims it held, and any
    /// tree orphaned by that severing is itself in the registry and resolved
    /// later in the same pass.
    pub(crate) fn collect_sweep(&mut self) -> usize {
        let before = self.arena.len();
        let sweep: Vec<NodeKey> = self.roots.values().map(|tree| tree.root).collect();
        for key in sweep {
            let Some(node) = self.arena.get(key) else {
                continue; // freed by an earlier cascade in this pass
            };
            if node.external_roots > 0 || node.parent.is_some() {
                continue;
            }
            match self.eligible_claimant(key) {
                Some(claimant) => self.promote(key, claimant),
                None => self.free_subtree(key),
            }
        }
        let freed = before - self.arena.len();
        if self.debug {
            tracing::debug!(freed, live = self.arena.len(), "sweep finished");
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use crate::Forest;

    #[test]
    fn test_first_registered_claimant_wins() {
        let forest = Forest::new();
        let pool = forest.pool();

        let target = pool.make("target");
        let first = pool.make("first");
        let second = pool.make("second");
        let by_first = target.claim_from(&first);
        let by_second = target.claim_from(&second);

        let mut root = target;
        root.reset();

        assert_eq!(by_first.parent_id(), Some(first.target_id()));
        assert_eq!(by_second.parent_id(), Some(first.target_id()));
    }

    #[test]
    fn test_subtree_moves_with_reparented_node() {
        let forest = Forest::new();
        let pool = forest.pool();

        // leaf under mid, mid claimed by a and b.
        let a = pool.make(0);
        let b = pool.make(1);
        let mid = pool.make(2);
        let leaf = pool.make(3);

        let leaf_claim = leaf.claim_from(&mid);
        let mut leaf_root = leaf;
        leaf_root.reset();

        let mid_by_a = mid.claim_from(&a);
        let mid_by_b = mid.claim_from(&b);
        let mut mid_root = mid;
        mid_root.reset();

        // mid (and leaf below it) now live in a's tree.
        assert_eq!(mid_by_a.parent_id(), Some(a.target_id()));
        assert_eq!(leaf_claim.parent_id(), Some(mid_by_a.target_id()));
        assert_eq!(forest.size(), 2);

        // Dropping a's whole tree hands mid to b.
        drop(mid_by_a);
        drop(a);
        assert_eq!(mid_by_b.parent_id(), Some(b.target_id()));
        assert!(!leaf_claim.is_null());
        assert_eq!(forest.live_nodes(), 3);
    }
}
