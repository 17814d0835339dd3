//! Per-node client-state bitmask

use serde::{Deserialize, Serialize};

/// A single client-state bit, stored as its mask (never zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientBit(u32);

impl ClientBit {
    /// Bit at `index`, if the index is in range
    pub fn from_index(index: u32) -> Option<Self> {
        if index < ClientBitSet::CAPACITY {
            Some(Self(1u32 << index))
        } else {
            None
        }
    }

    /// Bit from a mask carrying exactly one set bit
    pub fn from_mask(mask: u32) -> Option<Self> {
        if mask.count_ones() == 1 {
            Some(Self(mask))
        } else {
            None
        }
    }

    /// The single-bit mask
    pub fn mask(&self) -> u32 {
        self.0
    }

    /// Position of the bit
    pub fn index(&self) -> u32 {
        self.0.trailing_zeros()
    }
}

/// Fixed-width set of live client bits
///
/// Not synchronized itself; the owning node guards it with its lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientBitSet {
    active: u32,
}

impl ClientBitSet {
    /// Maximum number of concurrently live clients
    pub const CAPACITY: u32 = crate::config::MAX_CLIENTS_PER_BUFFER;

    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lowest free bit
    pub fn acquire(&mut self) -> Option<ClientBit> {
        let free = !self.active;
        if free == 0 {
            return None;
        }
        let bit = ClientBit(free & free.wrapping_neg());
        self.active |= bit.0;
        Some(bit)
    }

    /// Give a bit back; returns false if it was not held
    pub fn release(&mut self, bit: ClientBit) -> bool {
        let held = self.active & bit.0 != 0;
        self.active &= !bit.0;
        held
    }

    /// Mask of all held bits
    pub fn active_mask(&self) -> u32 {
        self.active
    }

    /// Number of held bits
    pub fn len(&self) -> u32 {
        self.active.count_ones()
    }

    /// True if no bit is held
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// True if every bit is held
    pub fn is_full(&self) -> bool {
        self.active == u32::MAX
    }
}
