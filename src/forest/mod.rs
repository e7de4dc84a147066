//! `Forest` — the ownership context that anchors every relation tree.
//!
//! The forest owns the node arena and the registry of live trees, and is the
//! sole authority over tree topology. Relation pointers hold weak references
//! into it; the forest (and any pool bound to it) holds the strong reference,
//! so dropping every context handle tears the whole structure down without a
//! reference cycle.
//!
//! # Re-entrancy
//!
//! Payload destructors may themselves drop relation pointers. Releases are
//! therefore never applied recursively: a handle drop enqueues a release
//! operation, and only the outermost frame drains the queue, applying
//! bookkeeping and dropping tombstoned payloads one at a time. Teardown of a
//! chain of any depth runs in constant stack space.

pub(crate) mod arena;
pub(crate) mod collect;
pub(crate) mod node;

pub use node::NodeId;

use crate::diag::ForestSnapshot;
use crate::error::RelationError;
use crate::ptr::{HandleState, RelationPool, RelationPtr};
use arena::NodeArena;
use node::{Node, NodeKey};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{BTreeMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use tracing::trace;

/// Registry record for one live tree: a maximal set of nodes connected by
/// tree-parent edges, distinguished by its single root.
pub(crate) struct Tree {
    pub(crate) root: NodeKey,
}

/// A release operation deferred through the pending queue.
pub(crate) enum Release {
    /// The last duty of a root-kind handle: drop one `external_roots` unit.
    Root { key: NodeKey },
    /// The last duty of an owned-kind handle: remove one claim edge instance.
    Claim { origin: NodeKey, target: NodeKey },
}

/// Interior state of a forest. All topology lives here, behind one `RefCell`.
pub(crate) struct ForestInner<T> {
    pub(crate) arena: NodeArena<T>,
    /// Live trees keyed by root identity; `BTreeMap` for deterministic
    /// iteration order during sweeps and snapshots.
    pub(crate) roots: BTreeMap<NodeId, Tree>,
    /// Whether orphaned subtrees are freed as soon as they are detected,
    /// versus deferred to an explicit [`Forest::collect`] call.
    pub(crate) auto_collect: bool,
    /// Verbose topology tracing toggle.
    pub(crate) debug: bool,
    /// Payloads tombstoned during collection, awaiting their actual drop.
    /// Drops run outside the `RefCell` borrow, children before parents.
    pub(crate) destroy: VecDeque<T>,
    next_id: u64,
}

impl<T> ForestInner<T> {
    fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            roots: BTreeMap::new(),
            auto_collect: true,
            debug: false,
            destroy: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Allocates a node wrapping `value` as a new singleton tree with one
    /// external root.
    pub(crate) fn allocate_node(&mut self, value: T) -> (NodeKey, NodeId) {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;

        let mut node = Node::new(id, value);
        node.external_roots = 1;
        let key = self.arena.insert(node);
        self.roots.insert(id, Tree { root: key });
        trace!(node = %id, "allocated root node");
        (key, id)
    }

    /// Records a symmetric claim edge pair: `origin` owns `target`.
    ///
    /// Tree topology is untouched; claims layer on top of the current tree
    /// shape until a reparenting promotes one of them. Returns `false` when
    /// either endpoint is already collected.
    pub(crate) fn record_claim(&mut self, origin: NodeKey, target: NodeKey) -> bool {
        if self.arena.get(origin).is_none() || self.arena.get(target).is_none() {
            return false;
        }
        self.arena.get_mut(target).expect("target alive").owned_by.push(origin);
        self.arena.get_mut(origin).expect("origin alive").owns.push(target);
        if self.debug {
            let (o, t) = (self.node_id(origin), self.node_id(target));
            tracing::debug!(origin = %o, target = %t, "claim recorded");
        }
        true
    }

    /// Adds one external root unit to a live node backing a root handle.
    pub(crate) fn add_external_root(&mut self, key: NodeKey) -> bool {
        match self.arena.get_mut(key) {
            Some(node) if !node.is_tombstoned() => {
                debug_assert!(node.parent.is_none(), "rooted node must be parentless");
                node.external_roots += 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn apply_release(&mut self, op: Release) {
        match op {
            Release::Root { key } => self.release_root(key),
            Release::Claim { origin, target } => self.release_claim(origin, target),
        }
    }

    #[inline]
    pub(crate) fn node_id(&self, key: NodeKey) -> NodeId {
        self.arena.get(key).map_or(NodeId::NULL, |n| n.id)
    }
}

/// Shared allocation behind every forest handle, pool, and relation pointer.
pub(crate) struct ForestShared<T> {
    pub(crate) inner: RefCell<ForestInner<T>>,
    /// Release operations enqueued while `inner` was borrowed. A separate
    /// cell so a handle drop can always record its release.
    pending: RefCell<VecDeque<Release>>,
    /// Set while some frame is draining; nested frames enqueue and return.
    draining: Cell<bool>,
}

impl<T> ForestShared<T> {
    /// Enqueues a release and drains if this is the outermost frame.
    pub(crate) fn release(&self, op: Release) {
        self.pending.borrow_mut().push_back(op);
        self.drain();
    }

    /// Applies pending releases and drops tombstoned payloads until both
    /// queues are empty.
    ///
    /// Payload drops run outside the `inner` borrow, so a destructor that
    /// resets further relation pointers only grows the queues; the loop here
    /// picks that work up iteratively. If `inner` is currently borrowed
    /// (a release fired inside an access closure), the queue is left for the
    /// borrow holder to drain on exit.
    pub(crate) fn drain(&self) {
        if self.draining.get() {
            return;
        }
        self.draining.set(true);

        loop {
            let op = self.pending.borrow_mut().pop_front();
            if let Some(op) = op {
                match self.inner.try_borrow_mut() {
                    Ok(mut inner) => inner.apply_release(op),
                    Err(_) => {
                        // Re-entrant call under an active borrow: put the
                        // operation back and let the borrow holder drain.
                        self.pending.borrow_mut().push_front(op);
                        break;
                    }
                }
                continue;
            }

            let value = match self.inner.try_borrow_mut() {
                Ok(mut inner) => inner.destroy.pop_front(),
                Err(_) => break,
            };
            match value {
                Some(value) => drop(value),
                None => break,
            }
        }

        self.draining.set(false);
    }
}

/// The ownership context: allocation and collection authority for a set of
/// relation trees.
///
/// `Forest` is a cheap handle to shared context state and may be cloned
/// freely; the context lives as long as its longest-held handle or pool.
/// Relation pointers do not keep the context alive.
pub struct Forest<T> {
    shared: Rc<ForestShared<T>>,
}

impl<T> Forest<T> {
    /// Creates an empty forest with auto-collect enabled.
    pub fn new() -> Self {
        Self {
            shared: Rc::new(ForestShared {
                inner: RefCell::new(ForestInner::new()),
                pending: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
            }),
        }
    }

    /// Returns a relation pool bound to this forest.
    pub fn pool(&self) -> RelationPool<T> {
        RelationPool::new(self.clone())
    }

    /// Allocates `value` as a new singleton tree and returns its root handle.
    pub fn allocate(&self, value: T) -> RelationPtr<T> {
        let (key, id) = self.shared.inner.borrow_mut().allocate_node(value);
        RelationPtr::new(
            Rc::downgrade(&self.shared),
            key,
            id,
            HandleState::Root,
        )
    }

    /// Records that `origin`'s node claims ownership of `target`'s node and
    /// returns the owned handle expressing that claim.
    ///
    /// Tree topology does not change; the claim is an additional edge layered
    /// on the current shape. Returns a null handle when either endpoint is
    /// already collected, belongs to another forest, or is itself null.
    pub fn claim(&self, origin: &RelationPtr<T>, target: &RelationPtr<T>) -> RelationPtr<T> {
        let ctx = Rc::downgrade(&self.shared);
        if !origin.belongs_to(&self.shared) || !target.belongs_to(&self.shared) {
            return RelationPtr::null(ctx);
        }
        let (origin_key, target_key) = (origin.key(), target.key());
        let recorded = self
            .shared
            .inner
            .borrow_mut()
            .record_claim(origin_key, target_key);
        self.shared.drain();
        if recorded {
            RelationPtr::new(
                ctx,
                target_key,
                target.target_id(),
                HandleState::Owned { origin: origin_key },
            )
        } else {
            RelationPtr::null(ctx)
        }
    }

    /// Sweeps the forest, freeing every tree not anchored by a live root
    /// handle. Returns the number of nodes freed.
    pub fn collect(&self) -> usize {
        let freed = self.shared.inner.borrow_mut().collect_sweep();
        self.shared.drain();
        freed
    }

    /// Toggles whether releases free orphaned subtrees synchronously or
    /// defer freeing to an explicit [`Forest::collect`] call.
    ///
    /// Reparenting on root loss always happens eagerly; only the freeing of
    /// unreachable subtrees is deferred when auto-collect is off.
    pub fn set_auto_collect(&self, enabled: bool) {
        self.shared.inner.borrow_mut().auto_collect = enabled;
    }

    /// Current auto-collect policy.
    pub fn auto_collect(&self) -> bool {
        self.shared.inner.borrow().auto_collect
    }

    /// Enables verbose tracing of topology mutations at `debug` level.
    pub fn set_debug(&self, enabled: bool) {
        self.shared.inner.borrow_mut().debug = enabled;
    }

    /// Number of live trees.
    pub fn size(&self) -> usize {
        self.shared.inner.borrow().roots.len()
    }

    /// Number of live nodes across all trees.
    pub fn live_nodes(&self) -> usize {
        self.shared.inner.borrow().arena.len()
    }

    /// True when `ptr` names a live node of this forest.
    pub fn contains(&self, ptr: &RelationPtr<T>) -> bool {
        ptr.belongs_to(&self.shared)
            && self
                .shared
                .inner
                .borrow()
                .arena
                .get(ptr.key())
                .is_some_and(|n| !n.is_tombstoned())
    }

    /// Borrows the value behind `ptr`, or `None` for a null target.
    ///
    /// The guard holds the forest open; topology mutations through other
    /// handles are deferred until it drops.
    pub fn get<'a>(&'a self, ptr: &RelationPtr<T>) -> Option<ValueRef<'a, T>> {
        self.try_get(ptr).ok()
    }

    /// Mutably borrows the value behind `ptr`, or `None` for a null target.
    pub fn get_mut<'a>(&'a self, ptr: &RelationPtr<T>) -> Option<ValueRefMut<'a, T>> {
        self.try_get_mut(ptr).ok()
    }

    /// Borrows the value behind `ptr`, reporting why on failure.
    ///
    /// # Errors
    ///
    /// [`RelationError::NullDereference`] when the target has been collected
    /// or `ptr` does not belong to this forest.
    pub fn try_get<'a>(&'a self, ptr: &RelationPtr<T>) -> Result<ValueRef<'a, T>, RelationError> {
        if !ptr.belongs_to(&self.shared) {
            return Err(RelationError::NullDereference);
        }
        let inner = self.shared.inner.borrow();
        let guard = Ref::filter_map(inner, |inner: &ForestInner<T>| {
            inner.arena.get(ptr.key()).and_then(|n| n.value.as_ref())
        })
        .map_err(|_| RelationError::NullDereference)?;
        Ok(ValueRef {
            guard: Some(guard),
            shared: Rc::as_ref(&self.shared),
        })
    }

    /// Mutably borrows the value behind `ptr`, reporting why on failure.
    ///
    /// # Errors
    ///
    /// [`RelationError::NullDereference`] when the target has been collected
    /// or `ptr` does not belong to this forest.
    pub fn try_get_mut<'a>(
        &'a self,
        ptr: &RelationPtr<T>,
    ) -> Result<ValueRefMut<'a, T>, RelationError> {
        if !ptr.belongs_to(&self.shared) {
            return Err(RelationError::NullDereference);
        }
        let inner = self.shared.inner.borrow_mut();
        let guard = RefMut::filter_map(inner, |inner: &mut ForestInner<T>| {
            inner.arena.get_mut(ptr.key()).and_then(|n| n.value.as_mut())
        })
        .map_err(|_| RelationError::NullDereference)?;
        Ok(ValueRefMut {
            guard: Some(guard),
            shared: Rc::as_ref(&self.shared),
        })
    }

    /// Takes a structural snapshot of every live tree.
    pub fn snapshot(&self) -> ForestSnapshot {
        crate::diag::snapshot(&self.shared.inner.borrow())
    }

    /// Serializes the structural snapshot as JSON.
    pub fn dump_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).expect("snapshot serializes")
    }

    /// Writes the structural snapshot to stdout.
    pub fn print(&self) {
        println!("{}", self.dump_json());
    }

    pub(crate) fn from_shared(shared: Rc<ForestShared<T>>) -> Self {
        Self { shared }
    }
}

impl<T> Clone for Forest<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> Default for Forest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for Forest<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.shared.inner.borrow();
        f.debug_struct("Forest")
            .field("trees", &inner.roots.len())
            .field("live_nodes", &inner.arena.len())
            .field("auto_collect", &inner.auto_collect)
            .finish()
    }
}

/// Shared borrow of a node's value, keyed off the forest context.
///
/// Releases deferred while the guard was live are drained when it drops.
pub struct ValueRef<'a, T> {
    guard: Option<Ref<'a, T>>,
    shared: &'a ForestShared<T>,
}

impl<T> Deref for ValueRef<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.guard.as_ref().expect("guard live until drop")
    }
}

impl<T> Drop for ValueRef<'_, T> {
    fn drop(&mut self) {
        self.guard.take();
        self.shared.drain();
    }
}

/// Exclusive borrow of a node's value, keyed off the forest context.
///
/// Relation pointers dropped through this guard (for example by overwriting a
/// payload field that holds one) enqueue their releases; the queue is drained
/// when the guard drops.
pub struct ValueRefMut<'a, T> {
    guard: Option<RefMut<'a, T>>,
    shared: &'a ForestShared<T>,
}

impl<T> Deref for ValueRefMut<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.guard.as_ref().expect("guard live until drop")
    }
}

impl<T> DerefMut for ValueRefMut<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_mut().expect("guard live until drop")
    }
}

impl<T> Drop for ValueRefMut<'_, T> {
    fn drop(&mut self) {
        self.guard.take();
        self.shared.drain();
    }
}
