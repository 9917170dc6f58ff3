use gravwell_common::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Allocator and registry of live entity handles.
///
/// Handles are monotonically increasing integers, never reused within one
/// world instance, so a dangling reference can only miss, not alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arena {
    next: u64,
    alive: BTreeSet<EntityId>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh handle.
    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        self.alive.insert(id);
        id
    }

    /// Release a handle. Returns false if it was not alive.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.alive.remove(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.alive.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Live handles in deterministic (ascending) order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive.iter().copied()
    }

    /// Release every handle. Allocation continues from where it left off.
    pub fn clear(&mut self) {
        self.alive.clear();
    }
}
