//! Filtering storage wrapper.
//!
//! Wraps another storage and decides, per variant, whether insertion and
//! extraction reach it. Everything else is delegated unchanged, so the
//! wrapped storage still enlists in the caller's transaction itself.

use crate::storage::{Storage, ViewSnapshot};
use crate::variant::TransferVariant;
use holdfast_txn::{Transaction, TransactionManager, TransferResult};
use std::fmt;
use std::rc::Rc;

type Predicate<V> = Rc<dyn Fn(&V) -> bool>;

/// A storage that only lets some variants in or out.
///
/// # Example
///
/// ```rust
/// use holdfast_storage::{FilteringStorage, ResourceVariant, SingleVariantStorage, Storage};
/// use holdfast_txn::TransactionManager;
///
/// let tm = TransactionManager::new();
/// let output = FilteringStorage::extraction_only(SingleVariantStorage::new(&tm, 64));
/// let ore = ResourceVariant::of("ore");
///
/// assert!(!output.supports_insertion());
/// assert_eq!(output.simulate_insert(&ore, 10, None).unwrap(), 0);
/// ```
#[derive(Clone)]
pub struct FilteringStorage<V, S> {
    inner: S,
    insert_filter: Option<Predicate<V>>,
    extract_filter: Option<Predicate<V>>,
}

impl<V: TransferVariant, S: Storage<V>> FilteringStorage<V, S> {
    /// Wraps `inner` with separate insert and extract predicates.
    pub fn new(
        inner: S,
        insert_filter: impl Fn(&V) -> bool + 'static,
        extract_filter: impl Fn(&V) -> bool + 'static,
    ) -> Self {
        Self {
            inner,
            insert_filter: Some(Rc::new(insert_filter)),
            extract_filter: Some(Rc::new(extract_filter)),
        }
    }

    /// Wraps `inner`, gating both directions with the same predicate.
    pub fn with_filter(inner: S, filter: impl Fn(&V) -> bool + 'static) -> Self {
        let filter: Predicate<V> = Rc::new(filter);
        Self {
            inner,
            insert_filter: Some(Rc::clone(&filter)),
            extract_filter: Some(filter),
        }
    }

    /// Wraps `inner` so that nothing can be extracted.
    pub fn insertion_only(inner: S) -> Self {
        Self {
            inner,
            insert_filter: Some(Rc::new(|_| true)),
            extract_filter: None,
        }
    }

    /// Wraps `inner` so that nothing can be inserted.
    pub fn extraction_only(inner: S) -> Self {
        Self {
            inner,
            insert_filter: None,
            extract_filter: Some(Rc::new(|_| true)),
        }
    }

    /// Wraps `inner` so that its contents can only be read.
    pub fn read_only(inner: S) -> Self {
        Self {
            inner,
            insert_filter: None,
            extract_filter: None,
        }
    }

    /// Returns the wrapped storage.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwraps the storage.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn can_insert(&self, variant: &V) -> bool {
        self.insert_filter
            .as_ref()
            .is_some_and(|filter| filter(variant))
    }

    fn can_extract(&self, variant: &V) -> bool {
        self.extract_filter
            .as_ref()
            .is_some_and(|filter| filter(variant))
    }
}

impl<V: TransferVariant, S: Storage<V>> Storage<V> for FilteringStorage<V, S> {
    fn manager(&self) -> &TransactionManager {
        self.inner.manager()
    }

    fn supports_insertion(&self) -> bool {
        self.insert_filter.is_some() && self.inner.supports_insertion()
    }

    fn supports_extraction(&self) -> bool {
        self.extract_filter.is_some() && self.inner.supports_extraction()
    }

    fn insert(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        if self.can_insert(variant) {
            self.inner.insert(variant, max_amount, tx)
        } else {
            Ok(0)
        }
    }

    fn extract(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        if self.can_extract(variant) {
            self.inner.extract(variant, max_amount, tx)
        } else {
            Ok(0)
        }
    }

    fn simulate_insert(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        if self.can_insert(variant) {
            self.inner.simulate_insert(variant, max_amount, tx)
        } else {
            Ok(0)
        }
    }

    fn simulate_extract(
        &self,
        variant: &V,
        max_amount: u64,
        tx: Option<&Transaction<'_>>,
    ) -> TransferResult<u64> {
        if self.can_extract(variant) {
            self.inner.simulate_extract(variant, max_amount, tx)
        } else {
            Ok(0)
        }
    }

    fn views(&self) -> Vec<ViewSnapshot<V>> {
        self.inner.views()
    }

    fn capacity_for(&self, variant: &V) -> u64 {
        self.inner.capacity_for(variant)
    }
}

impl<V, S: fmt::Debug> fmt::Debug for FilteringStorage<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteringStorage")
            .field("inner", &self.inner)
            .field("insertion", &self.insert_filter.is_some())
            .field("extraction", &self.extract_filter.is_some())
            .finish()
    }
}
