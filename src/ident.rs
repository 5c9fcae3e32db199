//! Per-entity-kind id allocation
//!
//! Tasks, work slots, and groups each draw their ids from an independent
//! monotonic counter. Ids read back from the store are claimed into the
//! allocator so freshly allocated ids never collide with persisted ones.

use std::collections::HashMap;

/// The kinds of entities that carry allocator-assigned ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Task,
    WorkSlot,
    Group,
}

/// Monotonic id counters, one per entity kind.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: HashMap<EntityKind, u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next free id for `kind` and advance the counter.
    pub fn next(&mut self, kind: EntityKind) -> u32 {
        let counter = self.next.entry(kind).or_insert(0);
        let id = *counter;
        *counter += 1;
        id
    }

    /// Register an explicitly supplied id, bumping the counter past it so
    /// later [`next`](Self::next) calls never collide.
    pub fn claim(&mut self, kind: EntityKind, id: u32) {
        let counter = self.next.entry(kind).or_insert(0);
        if id >= *counter {
            *counter = id + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_are_independent() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.next(EntityKind::Task), 0);
        assert_eq!(alloc.next(EntityKind::Task), 1);
        assert_eq!(alloc.next(EntityKind::WorkSlot), 0);
        assert_eq!(alloc.next(EntityKind::Group), 0);
        assert_eq!(alloc.next(EntityKind::Task), 2);
    }

    #[test]
    fn claim_bumps_past_explicit_ids() {
        let mut alloc = IdAllocator::new();
        alloc.claim(EntityKind::Task, 50);
        assert_eq!(alloc.next(EntityKind::Task), 51);
        // Claiming below the counter is a no-op.
        alloc.claim(EntityKind::Task, 3);
        assert_eq!(alloc.next(EntityKind::Task), 52);
    }
}
