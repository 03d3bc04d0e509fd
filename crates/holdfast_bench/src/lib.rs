//! Benchmark utilities.

#![warn(missing_docs)]

use holdfast_storage::{ResourceVariant, SingleVariantStorage, SlottedStorage};
use holdfast_txn::TransactionManager;

/// Kinds cycled through by [`filled_inventory`].
pub const KINDS: [&str; 4] = ["iron", "gold", "coal", "stone"];

/// Returns the variant for the `i`-th kind, wrapping around.
pub fn kind(i: usize) -> ResourceVariant {
    ResourceVariant::of(KINDS[i % KINDS.len()])
}

/// Creates an inventory whose slots are half full, cycling through kinds.
pub fn filled_inventory(
    manager: &TransactionManager,
    slots: usize,
    capacity: u64,
) -> SlottedStorage<ResourceVariant> {
    let slots = (0..slots)
        .map(|i| SingleVariantStorage::new(manager, capacity).with_contents(kind(i), capacity / 2))
        .collect();
    SlottedStorage::from_slots(manager, slots)
}
