//! `RelationPool` — a thin factory bound to one forest.
//!
//! The pool is the entry point applications use to allocate new root
//! handles. It holds nothing but a context handle, so it may be copied
//! freely and passed to collaborators without sharing any mutable state of
//! its own.

use super::RelationPtr;
use crate::forest::Forest;

/// A cheap, freely copyable factory for root handles.
pub struct RelationPool<T> {
    forest: Forest<T>,
}

impl<T> RelationPool<T> {
    pub(crate) fn new(forest: Forest<T>) -> Self {
        Self { forest }
    }

    /// Allocates `value` as a new singleton tree and returns its root handle.
    pub fn make(&self, value: T) -> RelationPtr<T> {
        self.forest.allocate(value)
    }

    /// The forest this pool allocates into.
    pub fn forest(&self) -> &Forest<T> {
        &self.forest
    }
}

impl<T> Clone for RelationPool<T> {
    fn clone(&self) -> Self {
        Self {
            forest: self.forest.clone(),
        }
    }
}

impl<T> core::fmt::Debug for RelationPool<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelationPool")
            .field("forest", &self.forest)
            .finish()
    }
}
