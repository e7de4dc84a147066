//! `RelationPtr` — the user-facing relation pointer handle.
//!
//! A handle is either a *root* (directly backing a tree root, counted in the
//! node's `external_roots`) or *owned* (expressing one symmetric claim edge
//! between its origin node and its target). Handles never own their node
//! directly; ownership is expressed through the forest's tree edges, so a
//! handle holds only a weak reference to the context plus the generational
//! key of its target. Once the target is collected the handle reads as null
//! instead of dangling.
//!
//! Dropping a handle performs its release (decrementing the root count or
//! removing its claim edge) through the forest's pending queue, so payload
//! destructors that drop further handles are processed iteratively by the
//! outermost frame.

pub(crate) mod pool;

pub use pool::RelationPool;

use crate::error::RelationError;
use crate::forest::node::{NodeId, NodeKey};
use crate::forest::{Forest, ForestShared, Release};
use std::rc::{Rc, Weak};

/// The kind of a relation pointer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Directly backs a tree root; one unit of the target's `external_roots`.
    Root,
    /// Expresses one ownership claim recorded in `owns`/`owned_by`.
    Owned,
    /// Bound to nothing; dereferences fail, releases are no-ops.
    Null,
}

/// Internal handle state; `Owned` remembers which node recorded the claim.
pub(crate) enum HandleState {
    Root,
    Owned { origin: NodeKey },
    Null,
}

/// A relation pointer: a cycle-safe smart handle into one forest.
pub struct RelationPtr<T> {
    ctx: Weak<ForestShared<T>>,
    key: NodeKey,
    id: NodeId,
    state: HandleState,
}

impl<T> RelationPtr<T> {
    pub(crate) fn new(
        ctx: Weak<ForestShared<T>>,
        key: NodeKey,
        id: NodeId,
        state: HandleState,
    ) -> Self {
        Self { ctx, key, id, state }
    }

    /// A handle bound to nothing.
    pub(crate) fn null(ctx: Weak<ForestShared<T>>) -> Self {
        Self {
            ctx,
            key: NodeKey::NULL,
            id: NodeId::NULL,
            state: HandleState::Null,
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> NodeKey {
        self.key
    }

    #[inline]
    pub(crate) fn belongs_to(&self, shared: &Rc<ForestShared<T>>) -> bool {
        core::ptr::eq(self.ctx.as_ptr(), Rc::as_ptr(shared))
    }

    /// Stable identity of the target node. Remains comparable after the node
    /// is collected; [`NodeId::NULL`] for handles that were never bound.
    #[inline]
    pub fn target_id(&self) -> NodeId {
        self.id
    }

    /// This handle's kind.
    pub fn kind(&self) -> HandleKind {
        match self.state {
            HandleState::Root => HandleKind::Root,
            HandleState::Owned { .. } => HandleKind::Owned,
            HandleState::Null => HandleKind::Null,
        }
    }

    /// True when the handle no longer reaches a live value: never bound,
    /// already reset, target collected, or context dropped.
    pub fn is_null(&self) -> bool {
        if matches!(self.state, HandleState::Null) {
            return true;
        }
        let Some(ctx) = self.ctx.upgrade() else {
            return true;
        };
        let result = match ctx.inner.try_borrow() {
            Ok(inner) => inner.arena.get(self.key).map_or(true, |n| n.is_tombstoned()),
            // A topology mutation is in flight on this thread; the handle is
            // still bound or its release is already queued.
            Err(_) => false,
        };
        result
    }

    /// True for a live root-kind handle.
    pub fn is_root(&self) -> bool {
        matches!(self.state, HandleState::Root) && !self.is_null()
    }

    /// True for a live owned-kind handle.
    pub fn is_owned(&self) -> bool {
        matches!(self.state, HandleState::Owned { .. }) && !self.is_null()
    }

    /// True when the target node currently has a tree parent.
    pub fn has_parent(&self) -> bool {
        self.parent_id().is_some()
    }

    /// Identity of the target's tree parent, if any.
    pub fn parent_id(&self) -> Option<NodeId> {
        let ctx = self.ctx.upgrade()?;
        let inner = ctx.inner.try_borrow().ok()?;
        let parent = inner.arena.get(self.key)?.parent?;
        Some(inner.node_id(parent))
    }

    /// Number of tree children currently anchored under the target.
    pub fn child_count(&self) -> usize {
        let Some(ctx) = self.ctx.upgrade() else {
            return 0;
        };
        let Ok(inner) = ctx.inner.try_borrow() else {
            return 0;
        };
        inner.arena.get(self.key).map_or(0, |n| n.children.len())
    }

    /// The owning forest, while any context handle or pool still holds it.
    pub fn context(&self) -> Option<Forest<T>> {
        self.ctx.upgrade().map(Forest::from_shared)
    }

    /// Records that `origin`'s node claims ownership of this handle's node
    /// and returns the owned handle expressing that claim.
    ///
    /// Returns a null handle when either endpoint is already collected.
    pub fn claim_from(&self, origin: &RelationPtr<T>) -> RelationPtr<T> {
        match self.ctx.upgrade() {
            Some(ctx) => Forest::from_shared(ctx).claim(origin, self),
            None => Self::null(self.ctx.clone()),
        }
    }

    /// Records a claim by this handle's own node on itself.
    ///
    /// Lets a payload keep a handle to its own node (to hand out further
    /// claims) without re-deriving one from the forest. A self-claim never
    /// anchors the node: it cannot become the tree-parent edge.
    pub fn claim_self(&self) -> RelationPtr<T> {
        self.claim_from(self)
    }

    /// Runs `f` against the target value.
    ///
    /// # Errors
    ///
    /// [`RelationError::NullDereference`] when the target has been collected;
    /// [`RelationError::ContextReleased`] when the forest is gone.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, RelationError> {
        let ctx = self.ctx.upgrade().ok_or(RelationError::ContextReleased)?;
        let result = {
            let inner = ctx.inner.borrow();
            let value = inner
                .arena
                .get(self.key)
                .and_then(|n| n.value.as_ref())
                .ok_or(RelationError::NullDereference)?;
            f(value)
        };
        ctx.drain();
        Ok(result)
    }

    /// Runs `f` against the target value with mutable access.
    ///
    /// Handles dropped inside `f` (for example by overwriting payload fields)
    /// have their releases applied when `f` returns.
    ///
    /// # Errors
    ///
    /// [`RelationError::NullDereference`] when the target has been collected;
    /// [`RelationError::ContextReleased`] when the forest is gone.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, RelationError> {
        let ctx = self.ctx.upgrade().ok_or(RelationError::ContextReleased)?;
        let result = {
            let mut inner = ctx.inner.borrow_mut();
            let value = inner
                .arena
                .get_mut(self.key)
                .and_then(|n| n.value.as_mut())
                .ok_or(RelationError::NullDereference)?;
            f(value)
        };
        ctx.drain();
        Ok(result)
    }

    /// Clones the target value out.
    ///
    /// # Errors
    ///
    /// See [`RelationPtr::with`].
    pub fn get(&self) -> Result<T, RelationError>
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Releases this handle's stake: a root handle drops one external root
    /// unit (triggering reparenting or collection on the last one), an owned
    /// handle removes its claim edge. Idempotent; a second reset is a no-op.
    pub fn reset(&mut self) {
        let state = core::mem::replace(&mut self.state, HandleState::Null);
        let op = match state {
            HandleState::Root => Release::Root { key: self.key },
            HandleState::Owned { origin } => Release::Claim {
                origin,
                target: self.key,
            },
            HandleState::Null => return,
        };
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.release(op);
        }
    }

    /// Enables verbose topology tracing on the owning forest.
    pub fn set_debug(&self, enabled: bool) {
        if let Some(forest) = self.context() {
            forest.set_debug(enabled);
        }
    }
}

impl<T> Drop for RelationPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Cloning duplicates the handle's stake: a root handle adds one external
/// root unit, an owned handle records one more claim edge instance. The new
/// handle is independent of the original. Cloning a handle whose target is
/// already collected yields a null handle.
impl<T> Clone for RelationPtr<T> {
    fn clone(&self) -> Self {
        let Some(ctx) = self.ctx.upgrade() else {
            return Self::null(self.ctx.clone());
        };
        let cloned = match self.state {
            HandleState::Root => {
                let added = ctx.inner.borrow_mut().add_external_root(self.key);
                added.then_some(HandleState::Root)
            }
            HandleState::Owned { origin } => {
                let recorded = ctx.inner.borrow_mut().record_claim(origin, self.key);
                recorded.then_some(HandleState::Owned { origin })
            }
            HandleState::Null => None,
        };
        ctx.drain();
        match cloned {
            Some(state) => Self {
                ctx: self.ctx.clone(),
                key: self.key,
                id: self.id,
                state,
            },
            None => Self::null(self.ctx.clone()),
        }
    }
}

// Handles compare by target identity so they can key maps and sets; every
// handle to the same node is equal regardless of kind.

impl<T> PartialEq for RelationPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for RelationPtr<T> {}

impl<T> PartialOrd for RelationPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for RelationPtr<T> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> core::hash::Hash for RelationPtr<T> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> core::fmt::Debug for RelationPtr<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelationPtr")
            .field("target", &self.id)
            .field("kind", &self.kind())
            .field("null", &self.is_null())
            .finish()
    }
}
