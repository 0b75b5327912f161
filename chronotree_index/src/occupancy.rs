// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Child-occupancy bitmask.
//!
//! One byte per node: bit `i` is set iff child slot `i` holds a subtree. A zero
//! byte marks a leaf-bearing node; this is the only signal the breadth-first
//! layout uses to decide whether child records follow.

use crate::types::OCTANT_COUNT;

bitflags::bitflags! {
    /// Which of the eight octant slots of a node are populated.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Occupancy: u8 {
        /// Slot 0: upper x, upper y, lower time.
        const SLOT_0 = 0b0000_0001;
        /// Slot 1: lower x, upper y, lower time.
        const SLOT_1 = 0b0000_0010;
        /// Slot 2: lower x, lower y, lower time.
        const SLOT_2 = 0b0000_0100;
        /// Slot 3: upper x, lower y, lower time.
        const SLOT_3 = 0b0000_1000;
        /// Slot 4: upper x, upper y, upper time.
        const SLOT_4 = 0b0001_0000;
        /// Slot 5: lower x, upper y, upper time.
        const SLOT_5 = 0b0010_0000;
        /// Slot 6: lower x, lower y, upper time.
        const SLOT_6 = 0b0100_0000;
        /// Slot 7: upper x, lower y, upper time.
        const SLOT_7 = 0b1000_0000;
    }
}

impl Occupancy {
    /// The flag for a single slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= OCTANT_COUNT`.
    pub fn slot(slot: usize) -> Self {
        assert!(slot < OCTANT_COUNT, "octant slot {slot} out of range");
        Self::from_bits_retain(1 << slot)
    }

    /// Encode from a per-slot presence test.
    pub fn from_slots(mut occupied: impl FnMut(usize) -> bool) -> Self {
        (0..OCTANT_COUNT)
            .filter(|&slot| occupied(slot))
            .fold(Self::empty(), |acc, slot| acc | Self::slot(slot))
    }

    /// Whether `slot` is populated.
    pub fn has(self, slot: usize) -> bool {
        slot < OCTANT_COUNT && self.contains(Self::slot(slot))
    }

    /// Occupied slot numbers in ascending order.
    pub fn high_bit_positions(self) -> impl Iterator<Item = usize> {
        (0..OCTANT_COUNT).filter(move |&slot| self.has(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn encode_matches_bit_layout() {
        let occ = Occupancy::from_slots(|slot| slot == 2 || slot == 4);
        assert_eq!(occ.bits(), 0b0001_0100);
        assert_eq!(occ, Occupancy::SLOT_2 | Occupancy::SLOT_4);
    }

    #[test]
    fn high_bit_positions_are_ascending() {
        let occ = Occupancy::from_bits_retain(0b1000_0101);
        let slots: Vec<_> = occ.high_bit_positions().collect();
        assert_eq!(slots, [0, 2, 7]);
        assert_eq!(Occupancy::empty().high_bit_positions().count(), 0);
        assert_eq!(Occupancy::all().high_bit_positions().count(), OCTANT_COUNT);
    }

    #[test]
    fn has_ignores_slots_past_the_last_octant() {
        let occ = Occupancy::all();
        assert!(occ.has(7));
        assert!(!occ.has(8));
    }
}
