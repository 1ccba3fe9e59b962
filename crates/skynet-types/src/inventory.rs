//! Per-faction part inventory.
//!
//! The key domain is the closed [`PartKind`] set, so counts live in a
//! fixed-size array indexed by [`PartKind::index`]. Every kind has an entry
//! at all times; a missing count reads as zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::PartKind;

/// Non-negative count of each part kind held by one faction.
///
/// Serializes as a map keyed by part kind so emitted results stay readable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<PartKind, u32>", from = "BTreeMap<PartKind, u32>")]
pub struct Inventory {
    counts: [u32; PartKind::COUNT],
}

impl Inventory {
    /// Create an empty inventory (every kind at zero).
    pub const fn new() -> Self {
        Self {
            counts: [0; PartKind::COUNT],
        }
    }

    /// Build an inventory from explicit per-kind counts.
    pub fn from_counts(counts: impl IntoIterator<Item = (PartKind, u32)>) -> Self {
        let mut inventory = Self::new();
        for (kind, quantity) in counts {
            inventory.add(kind, quantity);
        }
        inventory
    }

    /// Return the count held for `kind`.
    pub fn count(&self, kind: PartKind) -> u32 {
        self.counts.get(kind.index()).copied().unwrap_or(0)
    }

    /// Add `quantity` parts of `kind`. Saturates at `u32::MAX`.
    pub fn add(&mut self, kind: PartKind, quantity: u32) {
        if let Some(slot) = self.counts.get_mut(kind.index()) {
            *slot = slot.saturating_add(quantity);
        }
    }

    /// Add one part per element of `parts`.
    pub fn stock<'a>(&mut self, parts: impl IntoIterator<Item = &'a PartKind>) {
        for kind in parts {
            self.add(*kind, 1);
        }
    }

    /// Number of complete robots the current counts allow.
    ///
    /// This is the minimum count across all part kinds.
    pub fn complete_sets(&self) -> u32 {
        self.counts.iter().copied().min().unwrap_or(0)
    }

    /// Remove every complete set of parts and return how many were removed.
    ///
    /// Calling this on an inventory with a zero count for any kind is a no-op.
    pub fn assemble(&mut self) -> u32 {
        let sets = self.complete_sets();
        if sets > 0 {
            for slot in &mut self.counts {
                *slot = slot.saturating_sub(sets);
            }
        }
        sets
    }

    /// Total number of parts held across all kinds.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|count| u64::from(*count)).sum()
    }

    /// Iterate `(kind, count)` pairs in [`PartKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (PartKind, u32)> + '_ {
        PartKind::ALL.iter().map(|kind| (*kind, self.count(*kind)))
    }
}

impl From<Inventory> for BTreeMap<PartKind, u32> {
    fn from(inventory: Inventory) -> Self {
        inventory.iter().collect()
    }
}

impl From<BTreeMap<PartKind, u32>> for Inventory {
    fn from(map: BTreeMap<PartKind, u32>) -> Self {
        Self::from_counts(map)
    }
}

impl core::fmt::Display for Inventory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (kind, count) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{kind}: {count}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_inventory_has_every_kind_at_zero() {
        let inventory = Inventory::new();
        assert_eq!(inventory.iter().count(), 4);
        assert!(inventory.iter().all(|(_, count)| count == 0));
        assert_eq!(inventory.total(), 0);
    }

    #[test]
    fn assemble_takes_minimum_across_kinds() {
        let mut inventory = Inventory::from_counts([
            (PartKind::Head, 3),
            (PartKind::Torso, 2),
            (PartKind::Hand, 2),
            (PartKind::Feet, 5),
        ]);

        assert_eq!(inventory.assemble(), 2);
        assert_eq!(inventory.count(PartKind::Head), 1);
        assert_eq!(inventory.count(PartKind::Torso), 0);
        assert_eq!(inventory.count(PartKind::Hand), 0);
        assert_eq!(inventory.count(PartKind::Feet), 3);
    }

    #[test]
    fn assemble_is_noop_when_a_kind_is_missing() {
        let mut inventory = Inventory::from_counts([
            (PartKind::Head, 7),
            (PartKind::Torso, 7),
            (PartKind::Hand, 7),
        ]);
        let before = inventory;

        assert_eq!(inventory.assemble(), 0);
        assert_eq!(inventory, before);
        assert_eq!(inventory.assemble(), 0);
        assert_eq!(inventory, before);
    }

    #[test]
    fn stock_counts_each_part() {
        let mut inventory = Inventory::new();
        inventory.stock(&[PartKind::Hand, PartKind::Hand, PartKind::Feet]);
        assert_eq!(inventory.count(PartKind::Hand), 2);
        assert_eq!(inventory.count(PartKind::Feet), 1);
        assert_eq!(inventory.total(), 3);
    }

    #[test]
    fn serializes_as_map_with_all_keys() {
        let inventory = Inventory::from_counts([(PartKind::Feet, 3)]);
        let json = serde_json::to_value(inventory).unwrap();
        assert_eq!(json["HEAD"], 0);
        assert_eq!(json["FEET"], 3);

        let partial: Inventory = serde_json::from_str(r#"{"HAND": 2}"#).unwrap();
        assert_eq!(partial.count(PartKind::Hand), 2);
        assert_eq!(partial.count(PartKind::Head), 0);
    }

    #[test]
    fn display_lists_kinds_in_order() {
        let inventory = Inventory::from_counts([(PartKind::Torso, 1)]);
        assert_eq!(
            inventory.to_string(),
            "Head: 0, Torso: 1, Hand: 0, Feet: 0"
        );
    }
}
