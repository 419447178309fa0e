//! Identifiers and simple allocators for track entries.

use serde::{Deserialize, Serialize};

/// Identity of one started track entry.
///
/// Every `set_animation`/`add_animation` call on a runtime produces a fresh id, so
/// two plays of the same animation on the same track are distinguishable. The
/// scheduler compares ids to detect that a watched entry was superseded.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

/// Monotonic allocator for EntryId.
/// Ids start at 1; 0 is never handed out.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_entry: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_entry(&mut self) -> EntryId {
        self.next_entry = self.next_entry.wrapping_add(1);
        EntryId(self.next_entry)
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
