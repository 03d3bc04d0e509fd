//! Single-variant storage.

use crate::amount::ResourceAmount;
use crate::storage::{checked, Storage, StorageView, ViewSnapshot};
use crate::variant::TransferVariant;
use holdfast_txn::{SnapshotParticipant, Transaction, TransactionManager, TransferResult};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

type CapacityFn<V> = Rc<dyn Fn(&V) -> u64>;
type FilterFn<V> = Rc<dyn Fn(&V) -> bool>;

/// Storage for one variant at a time, like a tank or an inventory slot.
///
/// Inserting into an empty storage adopts the inserted variant; extracting
/// the last unit resets it to blank. Clones share the same contents.
///
/// # Example
///
/// ```rust
/// use holdfast_storage::{ResourceVariant, SingleVariantStorage, Storage};
/// use holdfast_txn::TransactionManager;
///
/// let tm = TransactionManager::new();
/// let lava_tank = SingleVariantStorage::new(&tm, 4000)
///     .with_insert_filter(|v: &ResourceVariant| v.is_of("lava"));
///
/// let water = ResourceVariant::of("water");
/// assert_eq!(lava_tank.simulate_insert(&water, 1000, None).unwrap(), 0);
/// ```
#[derive(Clone)]
pub struct SingleVariantStorage<V: TransferVariant> {
    slot: SnapshotParticipant<ResourceAmount<V>>,
    capacity: CapacityFn<V>,
    insert_filter: FilterFn<V>,
    extract_filter: FilterFn<V>,
}

impl<V: TransferVariant> SingleVariantStorage<V> {
    /// Creates an empty storage holding at most `capacity` of any variant.
    pub fn new(manager: &TransactionManager, capacity: u64) -> Self {
        Self::with_capacity_fn(manager, move |_| capacity)
    }

    /// Creates an empty storage whose capacity depends on the variant.
    pub fn with_capacity_fn(
        manager: &TransactionManager,
        capacity: impl Fn(&V) -> u64 + 'static,
    ) -> Self {
        Self {
            slot: SnapshotParticipant::new(manager, ResourceAmount::blank()),
            capacity: Rc::new(capacity),
            insert_filter: Rc::new(|_| true),
            extract_filter: Rc::new(|_| true),
        }
    }

    /// Only accepts insertion of variants matching `filter`.
    #[must_use]
    pub fn with_insert_filter(mut self, filter: impl Fn(&V) -> bool + 'static) -> Self {
        self.insert_filter = Rc::new(filter);
        self
    }

    /// Only allows extraction of variants matching `filter`.
    #[must_use]
    pub fn with_extract_filter(mut self, filter: impl Fn(&V) -> bool + 'static) -> Self {
        self.extract_filter = Rc::new(filter);
        self
    }

    /// Starts with `amount` of `variant`, clamped to the capacity.
    ///
    /// This is setup, not a transfer: no transaction is involved. Call it
    /// before registering final commit listeners.
    #[must_use]
    pub fn with_contents(mut self, variant: V, amount: u64) -> Self {
        let amount = amount.min((self.capacity)(&variant));
        let manager = self.slot.manager().clone();
        self.slot = SnapshotParticipant::new(&manager, ResourceAmount::new(variant, amount));
        self
    }

    /// Returns the current contents, including uncommitted changes.
    #[must_use]
    pub fn resource_amount(&self) -> ResourceAmount<V> {
        self.slot.get()
    }

    /// Returns `true` if this storage holds a snapshot for `tx`.
    #[must_use]
    pub fn is_enlisted(&self, tx: &Transaction<'_>) -> bool {
        self.slot.is_enlisted(tx)
    }

    /// Registers a listener run after each committed root transaction that
    /// changed this storage.
    pub fn on_final_commit(&self, listener: impl Fn(&ResourceAmount<V>) + 'static) {
        self.slot.on_final_commit(listener);
    }

    /// Returns `true` if the storage currently holds `variant` or nothing.
    #[must_use]
    pub fn accepts(&self, variant: &V) -> bool {
        self.slot.with_state(|held| held.accepts(variant))
    }

    /// Returns `true` if the storage currently holds `variant`.
    #[must_use]
    pub fn holds(&self, variant: &V) -> bool {
        self.slot
            .with_state(|held| !held.is_blank() && held.variant() == variant)
    }
}

impl<V: TransferVariant> Storage<V> for SingleVariantStorage<V> {
    fn manager(&self) -> &TransactionManager {
        self.slot.manager()
    }

    fn insert(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        let Some(tx) = checked(self.manager(), tx)? else {
            return self.simulate_insert(variant, max_amount, None);
        };
        if variant.is_blank() || max_amount == 0 || !(self.insert_filter)(variant) {
            return Ok(0);
        }

        let accepted = self.slot.with_state(|held| {
            if held.accepts(variant) {
                (self.capacity)(variant)
                    .saturating_sub(held.amount())
                    .min(max_amount)
            } else {
                0
            }
        });
        if accepted > 0 {
            self.slot
                .update(tx, |held| *held = held.grown(variant, accepted))?;
            trace!(id = %tx.id(), ?variant, accepted, "inserted");
        }
        Ok(accepted)
    }

    fn extract(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        let Some(tx) = checked(self.manager(), tx)? else {
            return self.simulate_extract(variant, max_amount, None);
        };
        if variant.is_blank() || max_amount == 0 || !(self.extract_filter)(variant) {
            return Ok(0);
        }

        let extracted = self.slot.with_state(|held| {
            if !held.is_blank() && held.variant() == variant {
                held.amount().min(max_amount)
            } else {
                0
            }
        });
        if extracted > 0 {
            self.slot.update(tx, |held| *held = held.shrunk(extracted))?;
            trace!(id = %tx.id(), ?variant, extracted, "extracted");
        }
        Ok(extracted)
    }

    fn views(&self) -> Vec<ViewSnapshot<V>> {
        vec![ViewSnapshot {
            resource: self.resource(),
            amount: self.amount(),
            capacity: self.capacity(),
        }]
    }

    fn capacity_for(&self, variant: &V) -> u64 {
        if variant.is_blank() {
            0
        } else {
            (self.capacity)(variant)
        }
    }
}

impl<V: TransferVariant> StorageView<V> for SingleVariantStorage<V> {
    fn resource(&self) -> V {
        self.slot.with_state(|held| held.variant().clone())
    }

    fn amount(&self) -> u64 {
        self.slot.with_state(ResourceAmount::amount)
    }

    fn capacity(&self) -> u64 {
        self.slot.with_state(|held| (self.capacity)(held.variant()))
    }

    fn is_resource_blank(&self) -> bool {
        self.slot.with_state(ResourceAmount::is_blank)
    }
}

impl<V: TransferVariant> fmt::Debug for SingleVariantStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleVariantStorage")
            .field("contents", &self.resource_amount())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::ResourceVariant;
    use holdfast_txn::TransferError;
    use std::cell::Cell;

    fn water() -> ResourceVariant {
        ResourceVariant::of("water")
    }

    fn lava() -> ResourceVariant {
        ResourceVariant::of("lava")
    }

    #[test]
    fn insert_clamps_to_capacity() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 1000);

        let tx = tm.open_outer().unwrap();
        assert_eq!(tank.insert(&water(), 600, Some(&tx)).unwrap(), 600);
        assert_eq!(tank.insert(&water(), 600, Some(&tx)).unwrap(), 400);
        assert_eq!(tank.insert(&water(), 600, Some(&tx)).unwrap(), 0);
        tx.commit().unwrap();
        tx.close().unwrap();

        assert_eq!(tank.amount_of(&water()), 1000);
    }

    #[test]
    fn other_variant_is_rejected_while_holding() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 1000).with_contents(water(), 10);

        let tx = tm.open_outer().unwrap();
        assert_eq!(tank.insert(&lava(), 100, Some(&tx)).unwrap(), 0);
        assert_eq!(tank.extract(&lava(), 100, Some(&tx)).unwrap(), 0);
        assert!(!tank.is_enlisted(&tx));
    }

    #[test]
    fn nested_insert_rolled_back_by_root() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 4000);

        let root = tm.open_outer().unwrap();
        {
            let nested = root.open_nested().unwrap();
            assert_eq!(tank.insert(&water(), 1000, Some(&nested)).unwrap(), 1000);
            nested.commit().unwrap();
            nested.close().unwrap();
        }
        assert_eq!(tank.amount(), 1000);
        root.close().unwrap();

        assert_eq!(tank.resource_amount(), ResourceAmount::blank());
    }

    #[test]
    fn root_abort_discards_root_and_nested_inserts() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 2);

        let root = tm.open_outer().unwrap();
        assert_eq!(tank.insert(&water(), 1, Some(&root)).unwrap(), 1);
        {
            let nested = root.open_nested().unwrap();
            assert_eq!(tank.insert(&water(), 1, Some(&nested)).unwrap(), 1);
            assert_eq!(tank.amount(), 2);
            nested.commit().unwrap();
            nested.close().unwrap();
        }
        assert_eq!(tank.amount(), 2);
        assert!(tank.is_enlisted(&root));
        root.close().unwrap();

        assert_eq!(tank.resource_amount(), ResourceAmount::blank());
        assert!(tank.is_resource_blank());
    }

    #[test]
    fn lava_tank_at_capacity_rejects_water() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 2).with_contents(lava(), 2);

        let tx = tm.open_outer().unwrap();
        assert_eq!(tank.insert(&water(), 1, Some(&tx)).unwrap(), 0);
        tx.commit().unwrap();
        tx.close().unwrap();

        assert_eq!(tank.resource_amount(), ResourceAmount::new(lava(), 2));
    }

    #[test]
    fn lava_tank_rejects_water() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 4000)
            .with_insert_filter(|v: &ResourceVariant| v.is_of("lava"));

        let tx = tm.open_outer().unwrap();
        assert_eq!(tank.insert(&water(), 1000, Some(&tx)).unwrap(), 0);
        assert!(!tank.is_enlisted(&tx));
        assert_eq!(tank.insert(&lava(), 1000, Some(&tx)).unwrap(), 1000);
        assert!(tank.is_enlisted(&tx));
    }

    #[test]
    fn blank_and_zero_requests_return_zero() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 10);

        let tx = tm.open_outer().unwrap();
        assert_eq!(tank.insert(&ResourceVariant::blank(), 5, Some(&tx)).unwrap(), 0);
        assert_eq!(tank.insert(&water(), 0, Some(&tx)).unwrap(), 0);
        assert_eq!(tank.extract(&water(), 5, Some(&tx)).unwrap(), 0);
        assert!(!tank.is_enlisted(&tx));
    }

    #[test]
    fn extracting_everything_resets_to_blank() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 100).with_contents(water(), 30);

        let tx = tm.open_outer().unwrap();
        assert_eq!(tank.extract(&water(), 50, Some(&tx)).unwrap(), 30);
        assert!(tank.is_resource_blank());
        assert_eq!(tank.insert(&lava(), 5, Some(&tx)).unwrap(), 5);
        tx.commit().unwrap();
        tx.close().unwrap();

        assert_eq!(tank.resource(), lava());
    }

    #[test]
    fn simulation_leaves_no_trace() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 100).with_contents(water(), 40);

        assert_eq!(tank.simulate_insert(&water(), 100, None).unwrap(), 60);
        assert_eq!(tank.simulate_extract(&water(), 100, None).unwrap(), 40);
        assert_eq!(tank.amount(), 40);

        let tx = tm.open_outer().unwrap();
        assert_eq!(tank.simulate_extract(&water(), 10, Some(&tx)).unwrap(), 10);
        assert!(!tank.is_enlisted(&tx));
        assert!(tx.is_current());
        assert_eq!(tank.amount(), 40);
    }

    #[test]
    fn missing_transaction_means_simulation() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 100);

        assert_eq!(tank.insert(&water(), 70, None).unwrap(), 70);
        assert!(tank.is_empty());

        // With a transaction open, the speculative step nests under it.
        let tx = tm.open_outer().unwrap();
        assert_eq!(tank.insert(&water(), 70, None).unwrap(), 70);
        assert!(tank.is_empty());
        assert!(tx.is_current());
    }

    #[test]
    fn foreign_transaction_is_an_error() {
        let tm = TransactionManager::new();
        let other = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 100);

        let tx = other.open_outer().unwrap();
        assert!(matches!(
            tank.insert(&water(), 1, Some(&tx)),
            Err(TransferError::ForeignTransaction { .. })
        ));
    }

    #[test]
    fn non_current_transaction_is_an_error() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 100);

        let root = tm.open_outer().unwrap();
        let _child = root.open_nested().unwrap();
        assert!(matches!(
            tank.insert(&water(), 1, Some(&root)),
            Err(TransferError::NotCurrent { .. })
        ));
        assert!(tank.is_empty());
    }

    #[test]
    fn variant_dependent_capacity() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::with_capacity_fn(&tm, |v: &ResourceVariant| {
            if v.is_of("lava") {
                1000
            } else {
                4000
            }
        });

        assert_eq!(tank.capacity_for(&lava()), 1000);
        assert_eq!(tank.capacity_for(&water()), 4000);
        assert_eq!(tank.capacity_for(&ResourceVariant::blank()), 0);
        assert_eq!(tank.simulate_insert(&lava(), 5000, None).unwrap(), 1000);
    }

    #[test]
    fn final_commit_reports_contents() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 100);
        let last = Rc::new(Cell::new(0));
        {
            let last = Rc::clone(&last);
            tank.on_final_commit(move |contents| last.set(contents.amount()));
        }

        tm.run_outer(|tx| {
            tank.insert(&water(), 20, Some(tx))?;
            tx.run_nested(|nested| tank.insert(&water(), 5, Some(nested)))
        })
        .unwrap();

        assert_eq!(last.get(), 25);
    }

    #[test]
    fn extract_filter_blocks_extraction_only() {
        let tm = TransactionManager::new();
        let tank = SingleVariantStorage::new(&tm, 100)
            .with_contents(water(), 50)
            .with_extract_filter(|_| false);

        assert_eq!(tank.simulate_extract(&water(), 10, None).unwrap(), 0);
        assert_eq!(tank.simulate_insert(&water(), 10, None).unwrap(), 10);
    }
}
