//! Property tests: arbitrary claim graphs never leak.

use arbor::{Forest, RelationPtr};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Alloc,
    Claim(usize, usize),
    ResetRoot(usize),
    Collect,
}

fn apply(
    forest: &Forest<u32>,
    roots: &mut Vec<Option<RelationPtr<u32>>>,
    edges: &mut Vec<RelationPtr<u32>>,
    op: &Operation,
) {
    match op {
        Operation::Alloc => {
            roots.push(Some(forest.pool().make(roots.len() as u32)));
        }
        Operation::Claim(owner, target) => {
            if roots.is_empty() {
                return;
            }
            let owner = &roots[owner % roots.len()];
            let target = &roots[target % roots.len()];
            if let (Some(owner), Some(target)) = (owner, target) {
                let edge = target.claim_from(owner);
                if !edge.is_null() {
                    edges.push(edge);
                }
            }
        }
        Operation::ResetRoot(index) => {
            if roots.is_empty() {
                return;
            }
            let slot = roots.len();
            roots[index % slot] = None;
        }
        Operation::Collect => {
            forest.collect();
        }
    }
}

proptest! {
    /// Whatever claim graph the operations build — cycles, self-claims,
    /// duplicate edges — releasing every root handle and sweeping reclaims
    /// every node.
    #[test]
    fn test_no_leak_under_arbitrary_claims(
        auto_collect in any::<bool>(),
        ops in proptest::collection::vec(
            prop_oneof![
                3 => Just(Operation::Alloc),
                4 => (any::<usize>(), any::<usize>()).prop_map(|(o, t)| Operation::Claim(o, t)),
                2 => any::<usize>().prop_map(Operation::ResetRoot),
                1 => Just(Operation::Collect),
            ],
            1..200
        )
    ) {
        let forest = Forest::new();
        forest.set_auto_collect(auto_collect);

        let mut roots: Vec<Option<RelationPtr<u32>>> = Vec::new();
        let mut edges: Vec<RelationPtr<u32>> = Vec::new();
        for op in &ops {
            apply(&forest, &mut roots, &mut edges, op);

            // Structural sanity after every step: the registry and the
            // snapshot agree, and no tree-parent chain ever cycles.
            let snap = forest.snapshot();
            prop_assert_eq!(snap.trees.len(), forest.size());
            let walked: usize = snap.trees.iter().map(|t| t.nodes.len()).sum();
            prop_assert_eq!(walked, forest.live_nodes());
        }

        roots.clear();
        edges.clear();
        forest.collect();
        prop_assert_eq!(forest.live_nodes(), 0);
        prop_assert_eq!(forest.size(), 0);
    }

    /// Root handles keep their node alive through any number of clone/drop
    /// rounds; the node dies exactly when the last clone goes.
    #[test]
    fn test_root_clone_counting(extra_clones in 1usize..20) {
        let forest = Forest::new();
        let pool = forest.pool();

        let first = pool.make(0u32);
        let clones: Vec<_> = (0..extra_clones).map(|_| first.clone()).collect();
        drop(first);
        prop_assert_eq!(forest.live_nodes(), 1);

        drop(clones);
        prop_assert_eq!(forest.live_nodes(), 0);
    }
}
