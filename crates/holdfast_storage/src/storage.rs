//! Storage trait definition.

use crate::amount::ResourceAmount;
use crate::variant::TransferVariant;
use holdfast_txn::{Transaction, TransactionManager, TransferError, TransferResult};
use std::rc::Rc;

/// A transactional store of resource amounts.
///
/// Mutations take the transaction they belong to. The storage enlists in
/// it before changing anything, so the change is undone if the transaction
/// (or any ancestor) closes without committing.
///
/// # Invariants
///
/// - `insert` returns an amount in `0..=max_amount` and never stores more
///   than the capacity for the variant
/// - `extract` returns 0 for variants it does not hold
/// - Rejections (incompatible variant, full, filtered) are a return value
///   of 0, never an error
/// - Errors are reserved for protocol violations: a closed, foreign or
///   non-current transaction
/// - Passing `None` as the transaction runs the operation speculatively
///   and discards its effect, exactly like the `simulate_*` methods
///
/// # Implementors
///
/// - [`crate::SingleVariantStorage`] - one resource, one capacity
/// - [`crate::SlottedStorage`] - ordered slots
/// - [`crate::FilteringStorage`] - predicate gate over another storage
/// - [`crate::CombinedStorage`] - several storages as one
pub trait Storage<V: TransferVariant> {
    /// Returns the manager whose transactions this storage takes part in.
    fn manager(&self) -> &TransactionManager;

    /// Returns `false` if `insert` always returns 0.
    fn supports_insertion(&self) -> bool {
        true
    }

    /// Returns `false` if `extract` always returns 0.
    fn supports_extraction(&self) -> bool {
        true
    }

    /// Inserts up to `max_amount` of `variant`, returning the amount
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if `tx` is closed, not current, or belongs to
    /// another manager.
    fn insert(&self, variant: &V, max_amount: u64, tx: Option<&Transaction<'_>>)
        -> TransferResult<u64>;

    /// Extracts up to `max_amount` of `variant`, returning the amount
    /// removed.
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    fn extract(&self, variant: &V, max_amount: u64, tx: Option<&Transaction<'_>>)
        -> TransferResult<u64>;

    /// Returns how much `insert` would accept, without changing anything.
    ///
    /// Runs the insertion in a child of `tx` (or of the current transaction,
    /// or in a fresh root) and closes it without committing.
    fn simulate_insert(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        let speculative = self.manager().open_speculative(tx)?;
        let accepted = self.insert(variant, max_amount, Some(&speculative))?;
        speculative.close()?;
        Ok(accepted)
    }

    /// Returns how much `extract` would remove, without changing anything.
    fn simulate_extract(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        let speculative = self.manager().open_speculative(tx)?;
        let extracted = self.extract(variant, max_amount, Some(&speculative))?;
        speculative.close()?;
        Ok(extracted)
    }

    /// Returns a snapshot of every slot, in slot order.
    ///
    /// Blank slots are included.
    fn views(&self) -> Vec<ViewSnapshot<V>>;

    /// Returns the maximum amount of `variant` this storage could hold if
    /// it held nothing else.
    fn capacity_for(&self, variant: &V) -> u64;

    /// Returns the non-blank slot contents, in slot order.
    fn contents(&self) -> Vec<ResourceAmount<V>> {
        self.views()
            .into_iter()
            .filter(|view| !view.is_resource_blank())
            .map(|view| ResourceAmount::new(view.resource, view.amount))
            .collect()
    }

    /// Returns the total amount of `variant` held.
    fn amount_of(&self, variant: &V) -> u64 {
        if variant.is_blank() {
            return 0;
        }
        self.views()
            .iter()
            .filter(|view| &view.resource == variant)
            .map(|view| view.amount)
            .sum()
    }

    /// Returns `true` if nothing is held.
    fn is_empty(&self) -> bool {
        self.views().iter().all(|view| view.is_resource_blank())
    }
}

impl<V, S> Storage<V> for Rc<S>
where
    V: TransferVariant,
    S: Storage<V> + ?Sized,
{
    fn manager(&self) -> &TransactionManager {
        (**self).manager()
    }

    fn supports_insertion(&self) -> bool {
        (**self).supports_insertion()
    }

    fn supports_extraction(&self) -> bool {
        (**self).supports_extraction()
    }

    fn insert(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        (**self).insert(variant, max_amount, tx)
    }

    fn extract(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        (**self).extract(variant, max_amount, tx)
    }

    fn simulate_insert(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        (**self).simulate_insert(variant, max_amount, tx)
    }

    fn simulate_extract(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        (**self).simulate_extract(variant, max_amount, tx)
    }

    fn views(&self) -> Vec<ViewSnapshot<V>> {
        (**self).views()
    }

    fn capacity_for(&self, variant: &V) -> u64 {
        (**self).capacity_for(variant)
    }
}

/// Read access to a single slot.
pub trait StorageView<V: TransferVariant> {
    /// Returns the stored variant, blank when empty.
    fn resource(&self) -> V;

    /// Returns the stored amount.
    fn amount(&self) -> u64;

    /// Returns the capacity for the stored variant.
    fn capacity(&self) -> u64;

    /// Returns `true` if the slot is empty.
    fn is_resource_blank(&self) -> bool {
        self.resource().is_blank()
    }
}

/// A point-in-time copy of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot<V> {
    /// Stored variant.
    pub resource: V,
    /// Stored amount.
    pub amount: u64,
    /// Capacity for the stored variant.
    pub capacity: u64,
}

impl<V: TransferVariant> StorageView<V> for ViewSnapshot<V> {
    fn resource(&self) -> V {
        self.resource.clone()
    }

    fn amount(&self) -> u64 {
        self.amount
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn is_resource_blank(&self) -> bool {
        self.resource.is_blank()
    }
}

/// Resolves the transaction an operation runs in.
///
/// `Some(tx)` is checked to be current and to belong to `manager`. `None`
/// yields `Ok(None)`: the caller should fall back to simulation.
pub(crate) fn checked<'t, 'p>(
    manager: &TransactionManager,
    tx: Option<&'t Transaction<'p>>,
) -> TransferResult<Option<&'t Transaction<'p>>> {
    let Some(tx) = tx else {
        return Ok(None);
    };
    if !tx.manager().ptr_eq(manager) {
        return Err(TransferError::ForeignTransaction { id: tx.id() });
    }
    tx.ensure_current()?;
    Ok(Some(tx))
}
