//! Combined storage.

use crate::storage::{checked, Storage, ViewSnapshot};
use crate::variant::TransferVariant;
use holdfast_txn::{Transaction, TransactionManager, TransferResult};
use std::fmt;
use std::rc::Rc;

/// Several storages presented as one.
///
/// Insertion and extraction go through the parts in order until the
/// request is satisfied. Parts are shared, so the same storage can be part
/// of several combinations. A part reporting more than it was asked for
/// is counted as having moved exactly the amount requested.
#[derive(Clone)]
pub struct CombinedStorage<V: TransferVariant> {
    manager: TransactionManager,
    parts: Vec<Rc<dyn Storage<V>>>,
}

impl<V: TransferVariant> CombinedStorage<V> {
    /// Creates an empty combination.
    pub fn new(manager: &TransactionManager) -> Self {
        Self {
            manager: manager.clone(),
            parts: Vec::new(),
        }
    }

    /// Appends a part.
    #[must_use]
    pub fn with_part(mut self, part: impl Storage<V> + 'static) -> Self {
        self.parts.push(Rc::new(part));
        self
    }

    /// Appends a shared part.
    #[must_use]
    pub fn with_shared_part(mut self, part: Rc<dyn Storage<V>>) -> Self {
        self.parts.push(part);
        self
    }

    /// Returns the parts in order.
    #[must_use]
    pub fn parts(&self) -> &[Rc<dyn Storage<V>>] {
        &self.parts
    }
}

impl<V: TransferVariant> Storage<V> for CombinedStorage<V> {
    fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    fn supports_insertion(&self) -> bool {
        self.parts.iter().any(|part| part.supports_insertion())
    }

    fn supports_extraction(&self) -> bool {
        self.parts.iter().any(|part| part.supports_extraction())
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

        let mut remaining = max_amount;
        for part in self.parts.iter().filter(|part| part.supports_insertion()) {
            if remaining == 0 {
                break;
            }
            remaining -= part.insert(variant, remaining, Some(tx))?.min(remaining);
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

        let mut remaining = max_amount;
        for part in self.parts.iter().filter(|part| part.supports_extraction()) {
            if remaining == 0 {
                break;
            }
            remaining -= part.extract(variant, remaining, Some(tx))?.min(remaining);
        }
        Ok(max_amount - remaining)
    }

    fn views(&self) -> Vec<ViewSnapshot<V>> {
        self.parts.iter().flat_map(|part| part.views()).collect()
    }

    fn capacity_for(&self, variant: &V) -> u64 {
        self.parts
            .iter()
            .map(|part| part.capacity_for(variant))
            .fold(0, u64::saturating_add)
    }
}

impl<V: TransferVariant> fmt::Debug for CombinedStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedStorage")
            .field("parts", &self.parts.len())
            .field("contents", &self.contents())
            .finish()
    }
}
