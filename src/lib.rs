//! # `arbor` - Cycle-Safe Relation Pointers
//!
//! A smart pointer and ownership-tracking context that free graphs containing
//! reference cycles deterministically, without leaking and without a tracing
//! garbage collector. Plain reference counting leaks when two objects own
//! each other; whole-heap cycle collectors periodically scan everything.
//! `arbor` instead maintains, incrementally, an explicit **ownership forest**
//! parallel to the arbitrary (possibly cyclic) graph of application
//! references, so liveness resolves locally even across cycles.
//!
//! ## How it works
//!
//! Every node lives in exactly one tree of the forest. The tree-parent edges
//! are the single source of truth for lifetime and are acyclic by
//! construction; every other ownership relationship is a symmetric *claim*
//! edge (`owns`/`owned_by`) layered on top. A cycle of claims is just edges
//! between small trees, so collecting a tree never traces through a cycle:
//!
//! - [`RelationPool::make`] allocates a value as a new single-node tree and
//!   hands back a *root* handle.
//! - [`RelationPtr::claim_from`] records that one node owns another, without
//!   restructuring any tree.
//! - When a node's last root handle drops, the forest promotes one surviving
//!   claim to the real tree-parent edge (reparenting the whole subtree), or,
//!   when no claimant outside the subtree survives, frees the subtree.
//! - [`Forest::collect`] sweeps every unanchored tree; with auto-collect on
//!   (the default) orphans are freed as soon as they appear.
//!
//! ## Safety Guarantees
//!
//! - **No leaks under cycles**: once every externally held root handle is
//!   gone, a claim cycle of any shape is reclaimed in full.
//! - **No dangling access**: handles hold generational keys, never pointers;
//!   a collected target reads as null instead of aliasing freed storage.
//! - **Bounded stack**: teardown and traversal are iterative worklists.
//!   Chains tens of thousands of nodes deep collect in constant stack space,
//!   including when payload destructors drop further handles.
//!
//! ## Concurrency
//!
//! Single-threaded by design: a forest is an ordinary in-process structure
//! owned by one logical thread; sharing across threads requires external
//! synchronization and is out of scope.
//!
//! ## Example
//!
//! ```rust
//! use arbor::Forest;
//!
//! let forest = Forest::new();
//! let pool = forest.pool();
//!
//! // Two nodes owning each other: a cycle plain Rc would leak.
//! let a = pool.make("a");
//! let b = pool.make("b");
//! let a_owned_by_b = a.claim_from(&b);
//! let b_owned_by_a = b.claim_from(&a);
//! assert_eq!(forest.size(), 2);
//!
//! drop(a);
//! drop(b);
//! drop(a_owned_by_b);
//! drop(b_owned_by_a);
//! forest.collect();
//! assert_eq!(forest.live_nodes(), 0);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod diag;
pub mod error;
pub mod forest;
pub mod ptr;

pub use diag::{ForestSnapshot, NodeSnapshot, TreeSnapshot};
pub use error::RelationError;
pub use forest::{Forest, NodeId, ValueRef, ValueRefMut};
pub use ptr::{HandleKind, RelationPool, RelationPtr};

// Compile-time layout checks for the identity types every edge and handle
// carries.
const _: () = {
    use core::mem;

    // A node key packs index + generation into one word-sized value.
    assert!(mem::size_of::<crate::forest::node::NodeKey>() == 8);

    // Node identities are bare u64 newtypes.
    assert!(mem::size_of::<NodeId>() == 8);
};
