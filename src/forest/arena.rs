//! `NodeArena` — generational slot storage for forest nodes.
//!
//! Nodes are kept in a single growable arena and addressed by `NodeKey`
//! (index + generation) rather than by heap pointers, so every relation
//! pointer and claim edge refers to a node by stable identity with no
//! aliasing hazards. Freed slots go onto an intrusive free list and are
//! reused with a bumped generation, which makes stale keys resolve to
//! `None` instead of to the slot's new occupant.

use super::node::{Node, NodeKey};

/// One arena slot. The generation is bumped every time the slot transitions
/// from occupied to free, so it is even while occupied and odd while free.
enum Slot<T> {
    Occupied { generation: u32, node: Node<T> },
    Free { generation: u32, next_free: Option<u32> },
}

/// Generational arena holding every live node of one forest.
pub(crate) struct NodeArena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> NodeArena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Number of live nodes.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Inserts a node, reusing a freed slot when one is available.
    pub(crate) fn insert(&mut self, node: Node<T>) -> NodeKey {
        self.len += 1;

        if let Some(index) = self.free_head {
            let slot = &mut self.slots[index as usize];
            let (generation, next_free) = match *slot {
                Slot::Free {
                    generation,
                    next_free,
                } => (generation.wrapping_add(1), next_free),
                Slot::Occupied { .. } => unreachable!("free list points at occupied slot"),
            };
            self.free_head = next_free;
            *slot = Slot::Occupied { generation, node };
            NodeKey::new(index, generation)
        } else {
            let index = u32::try_from(self.slots.len()).expect("arena exceeds u32 indices");
            self.slots.push(Slot::Occupied {
                generation: 0,
                node,
            });
            NodeKey::new(index, 0)
        }
    }

    /// Returns the node named by `key`, or `None` if the key is stale.
    #[inline]
    pub(crate) fn get(&self, key: NodeKey) -> Option<&Node<T>> {
        match self.slots.get(key.index as usize) {
            Some(Slot::Occupied { generation, node }) if *generation == key.generation => {
                Some(node)
            }
            _ => None,
        }
    }

    /// Mutable access to the node named by `key`.
    #[inline]
    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node<T>> {
        match self.slots.get_mut(key.index as usize) {
            Some(Slot::Occupied { generation, node }) if *generation == key.generation => {
                Some(node)
            }
            _ => None,
        }
    }

    /// Frees the slot named by `key` and returns its node.
    ///
    /// The slot's generation is bumped, so any key still naming the old
    /// occupant becomes stale.
    pub(crate) fn remove(&mut self, key: NodeKey) -> Option<Node<T>> {
        let slot = self.slots.get_mut(key.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == key.generation => {
                let freed = Slot::Free {
                    generation: key.generation.wrapping_add(1),
                    next_free: self.free_head,
                };
                let old = core::mem::replace(slot, freed);
                self.free_head = Some(key.index);
                self.len -= 1;
                match old {
                    Slot::Occupied { node, .. } => Some(node),
                    Slot::Free { .. } => unreachable!(),
                }
            }
            _ => None,
        }
    }

    /// Iterates over every live node with its key.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node<T>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, node } => Some((
                    NodeKey::new(u32::try_from(index).expect("arena index fits u32"), *generation),
                    node,
                )),
                Slot::Free { .. } => None,
            })
    }
}
