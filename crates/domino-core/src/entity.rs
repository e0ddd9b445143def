//! Entity identifiers and allocation.
//!
//! An [`EntityId`] packs a *generation* counter in the high 32 bits and a slot
//! *index* in the low 32 bits. Destroying an entity bumps the generation of its
//! slot, so an id that referred to a destroyed domino can never compare equal to
//! the id of whatever is spawned into that slot later. Undo relies on this: a
//! resurrected domino always comes back under a fresh id and the history has to
//! migrate references explicitly.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational handle to a placeable entity.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Build an id from a slot index and the slot's generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// Slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// Slot generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` form, e.g. for handing to a renderer as an opaque key.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Rebuild from [`to_raw`](Self::to_raw).
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// IdAllocator
// ---------------------------------------------------------------------------

/// Hands out [`EntityId`]s and retires them.
///
/// Retired slots go to the back of a FIFO queue so a slot is reused as late
/// as possible; together with the generation bump this keeps ids of recently
/// destroyed dominoes from ever being mistaken for live ones.
#[derive(Debug, Default)]
pub struct IdAllocator {
    /// Generation currently stamped on each slot.
    generations: Vec<u32>,
    /// Liveness per slot.
    live: Vec<bool>,
    /// Retired slots waiting for reuse.
    retired: VecDeque<u32>,
}

impl IdAllocator {
    /// An allocator with no slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce an id that is not equal to any id handed out before.
    pub fn allocate(&mut self) -> EntityId {
        match self.retired.pop_front() {
            Some(index) => {
                let slot = index as usize;
                self.live[slot] = true;
                EntityId::new(index, self.generations[slot])
            }
            None => {
                let index = self.generations.len() as u32;
                self.generations.push(0);
                self.live.push(true);
                EntityId::new(index, 0)
            }
        }
    }

    /// Retire `id`. Returns `false` when `id` is stale or was never issued.
    pub fn retire(&mut self, id: EntityId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        let slot = id.index() as usize;
        self.live[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.retired.push_back(id.index());
        true
    }

    /// Whether `id` names a live slot at its current generation.
    pub fn is_live(&self, id: EntityId) -> bool {
        let slot = id.index() as usize;
        slot < self.generations.len() && self.live[slot] && self.generations[slot] == id.generation()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
