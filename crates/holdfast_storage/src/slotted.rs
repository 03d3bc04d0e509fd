//! Slotted storage.

use crate::single::SingleVariantStorage;
use crate::storage::{checked, Storage, ViewSnapshot};
use crate::variant::TransferVariant;
use holdfast_txn::{Transaction, TransactionManager, TransferResult};

/// An ordered list of independent single-variant slots.
///
/// Insertion first tops up slots already holding the variant, then fills
/// blank slots, each pass in slot order. Extraction walks the slots in
/// order. The result is the same as calling each slot in turn.
#[derive(Debug, Clone)]
pub struct SlottedStorage<V: TransferVariant> {
    manager: TransactionManager,
    slots: Vec<SingleVariantStorage<V>>,
}

impl<V: TransferVariant> SlottedStorage<V> {
    /// Creates `count` empty slots with the same capacity.
    pub fn new(manager: &TransactionManager, count: usize, capacity: u64) -> Self {
        let slots = (0..count)
            .map(|_| SingleVariantStorage::new(manager, capacity))
            .collect();
        Self::from_slots(manager, slots)
    }

    /// Creates a storage over existing slots.
    ///
    /// The slots should belong to `manager`; a slot bound to another
    /// manager rejects every transaction with an error.
    pub fn from_slots(manager: &TransactionManager, slots: Vec<SingleVariantStorage<V>>) -> Self {
        Self {
            manager: manager.clone(),
            slots,
        }
    }

    /// Returns the slot at `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&SingleVariantStorage<V>> {
        self.slots.get(index)
    }

    /// Returns all slots in order.
    #[must_use]
    pub fn slots(&self) -> &[SingleVariantStorage<V>] {
        &self.slots
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl<V: TransferVariant> Storage<V> for SlottedStorage<V> {
    fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    fn insert(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        let Some(tx) = checked(&self.manager, tx)? else {
            return self.simulate_insert(variant, max_amount, None);
        };
        if variant.is_blank() {
            return Ok(0);
        }

        let mut remaining = max_amount;
        for slot in self.slots.iter().filter(|slot| slot.holds(variant)) {
            if remaining == 0 {
                break;
            }
            remaining -= slot.insert(variant, remaining, Some(tx))?;
        }
        for slot in &self.slots {
            if remaining == 0 {
                break;
            }
            if slot.resource_amount().is_blank() {
                remaining -= slot.insert(variant, remaining, Some(tx))?;
            }
        }
        Ok(max_amount - remaining)
    }

    fn extract(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        let Some(tx) = checked(&self.manager, tx)? else {
            return self.simulate_extract(variant, max_amount, None);
        };
        if variant.is_blank() {
            return Ok(0);
        }

        let mut remaining = max_amount;
        for slot in &self.slots {
            if remaining == 0 {
                break;
            }
            remaining -= slot.extract(variant, remaining, Some(tx))?;
        }
        Ok(max_amount - remaining)
    }

    fn views(&self) -> Vec<ViewSnapshot<V>> {
        self.slots.iter().flat_map(|slot| slot.views()).collect()
    }

    fn capacity_for(&self, variant: &V) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.capacity_for(variant))
            .fold(0, u64::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::ResourceAmount;
    use crate::variant::ResourceVariant;

    fn stone() -> ResourceVariant {
        ResourceVariant::of("stone")
    }

    fn dirt() -> ResourceVariant {
        ResourceVariant::of("dirt")
    }

    fn amounts(storage: &SlottedStorage<ResourceVariant>) -> Vec<u64> {
        storage.views().iter().map(|view| view.amount).collect()
    }

    #[test]
    fn insert_tops_up_matching_slots_first() {
        let tm = TransactionManager::new();
        let slots = vec![
            SingleVariantStorage::new(&tm, 64),
            SingleVariantStorage::new(&tm, 64).with_contents(dirt(), 10),
            SingleVariantStorage::new(&tm, 64).with_contents(stone(), 60),
            SingleVariantStorage::new(&tm, 64),
        ];
        let inventory = SlottedStorage::from_slots(&tm, slots);

        let tx = tm.open_outer().unwrap();
        assert_eq!(inventory.insert(&stone(), 70, Some(&tx)).unwrap(), 70);
        tx.commit().unwrap();
        tx.close().unwrap();

        // 4 into the stone slot, then 64 and 2 into the blank slots in order.
        assert_eq!(amounts(&inventory), vec![64, 10, 64, 2]);
        assert_eq!(inventory.amount_of(&stone()), 130);
    }

    #[test]
    fn insert_stops_when_full() {
        let tm = TransactionManager::new();
        let inventory = SlottedStorage::new(&tm, 2, 10);

        assert_eq!(inventory.simulate_insert(&stone(), 50, None).unwrap(), 20);
        assert_eq!(inventory.capacity_for(&stone()), 20);
        assert!(inventory.is_empty());
    }

    #[test]
    fn extract_walks_slots_in_order() {
        let tm = TransactionManager::new();
        let slots = vec![
            SingleVariantStorage::new(&tm, 64).with_contents(stone(), 5),
            SingleVariantStorage::new(&tm, 64).with_contents(dirt(), 5),
            SingleVariantStorage::new(&tm, 64).with_contents(stone(), 5),
        ];
        let inventory = SlottedStorage::from_slots(&tm, slots);

        let tx = tm.open_outer().unwrap();
        assert_eq!(inventory.extract(&stone(), 7, Some(&tx)).unwrap(), 7);
        assert_eq!(amounts(&inventory), vec![0, 5, 3]);
        tx.close().unwrap();

        assert_eq!(amounts(&inventory), vec![5, 5, 5]);
    }

    #[test]
    fn aggregate_matches_slot_by_slot() {
        let tm = TransactionManager::new();
        let inventory = SlottedStorage::new(&tm, 3, 16);
        let manual = SlottedStorage::new(&tm, 3, 16);

        let tx = tm.open_outer().unwrap();
        let total = inventory.insert(&dirt(), 40, Some(&tx)).unwrap();
        let mut remaining = 40;
        for slot in manual.slots() {
            remaining -= slot.insert(&dirt(), remaining, Some(&tx)).unwrap();
        }

        assert_eq!(total, 40 - remaining);
        assert_eq!(inventory.contents(), manual.contents());
        assert_eq!(
            inventory.contents(),
            vec![
                ResourceAmount::new(dirt(), 16),
                ResourceAmount::new(dirt(), 16),
                ResourceAmount::new(dirt(), 8),
            ]
        );
    }

    #[test]
    fn partial_nested_failure_restores_every_slot() {
        let tm = TransactionManager::new();
        let inventory = SlottedStorage::new(&tm, 2, 10);

        let root = tm.open_outer().unwrap();
        inventory.insert(&stone(), 5, Some(&root)).unwrap();
        {
            let nested = root.open_nested().unwrap();
            inventory.insert(&stone(), 15, Some(&nested)).unwrap();
            assert_eq!(amounts(&inventory), vec![10, 10]);
        }
        assert_eq!(amounts(&inventory), vec![5, 0]);
        root.commit().unwrap();
        root.close().unwrap();

        assert_eq!(amounts(&inventory), vec![5, 0]);
    }
}
