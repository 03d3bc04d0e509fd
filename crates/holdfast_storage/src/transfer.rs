//! Moving resources between storages.

use crate::storage::Storage;
use crate::variant::TransferVariant;
use holdfast_txn::{Transaction, TransferResult};
use tracing::debug;

/// Moves up to `max_amount` of resources matching `filter` from `from` to
/// `to`, returning the total moved.
///
/// Each stored variant is moved in its own child transaction: the
/// extractable amount is simulated, inserted into `to`, and then exactly
/// the accepted amount is extracted from `from`. The step commits only if
/// both sides agree, so a storage that lies in simulation cannot create or
/// destroy resources.
///
/// With `tx`, the move becomes part of it. Without, the move runs and
/// commits in a transaction of its own (nested under the current one if
/// there is one).
pub fn move_resources<V, F, T>(
    from: &F,
    to: &T,
    filter: impl Fn(&V) -> bool,
    max_amount: u64,
    tx: Option<&Transaction<'_>>,
) -> TransferResult<u64>
where
    V: TransferVariant,
    F: Storage<V> + ?Sized,
    T: Storage<V> + ?Sized,
{
    let outer = from.manager().open_speculative(tx)?;
    let mut moved = 0;

    let mut candidates: Vec<V> = Vec::new();
    for stored in from.contents() {
        if filter(stored.variant()) && !candidates.contains(stored.variant()) {
            candidates.push(stored.variant().clone());
        }
    }

    for variant in &candidates {
        if moved == max_amount {
            break;
        }
        let step = outer.open_nested()?;
        let extractable = from.simulate_extract(variant, max_amount - moved, Some(&step))?;
        if extractable == 0 {
            continue;
        }

        let transfer = step.open_nested()?;
        let accepted = to.insert(variant, extractable, Some(&transfer))?;
        if accepted > 0 && from.extract(variant, accepted, Some(&transfer))? == accepted {
            transfer.commit()?;
            moved += accepted;
        }
        transfer.close()?;
        step.commit()?;
        step.close()?;
    }

    outer.commit()?;
    outer.close()?;
    debug!(moved, "moved resources");
    Ok(moved)
}

/// Returns the first stored variant matching `filter`, in slot order.
pub fn find_stored_resource<V, S>(storage: &S, filter: impl Fn(&V) -> bool) -> Option<V>
where
    V: TransferVariant,
    S: Storage<V> + ?Sized,
{
    storage
        .contents()
        .into_iter()
        .map(|stored| stored.variant().clone())
        .find(|variant| filter(variant))
}

/// Returns how full a storage is, between 0 and 1.
///
/// Each slot contributes the ratio of its amount to its capacity, and the
/// result is the average over all slots. Slots without capacity count as
/// empty. A storage without slots is empty.
pub fn fill_ratio<V, S>(storage: &S) -> f64
where
    V: TransferVariant,
    S: Storage<V> + ?Sized,
{
    let views = storage.views();
    if views.is_empty() {
        return 0.0;
    }
    let total: f64 = views
        .iter()
        .map(|view| {
            if view.capacity == 0 {
                0.0
            } else {
                (view.amount as f64 / view.capacity as f64).min(1.0)
            }
        })
        .sum();
    total / views.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::FilteringStorage;
    use crate::single::SingleVariantStorage;
    use crate::slotted::SlottedStorage;
    use crate::storage::ViewSnapshot;
    use crate::variant::ResourceVariant;
    use holdfast_txn::{TransactionManager, TransferResult};

    fn iron() -> ResourceVariant {
        ResourceVariant::of("iron")
    }

    fn gold() -> ResourceVariant {
        ResourceVariant::of("gold")
    }

    #[test]
    fn move_without_transaction_commits() {
        let tm = TransactionManager::new();
        let chest = SingleVariantStorage::new(&tm, 64).with_contents(iron(), 40);
        let furnace = SingleVariantStorage::new(&tm, 16);

        let moved = move_resources(&chest, &furnace, |_| true, 64, None).unwrap();

        assert_eq!(moved, 16);
        assert_eq!(chest.amount_of(&iron()), 24);
        assert_eq!(furnace.amount_of(&iron()), 16);
        assert!(!tm.is_open());
    }

    #[test]
    fn move_respects_filter_and_limit() {
        let tm = TransactionManager::new();
        let chest = SlottedStorage::from_slots(
            &tm,
            vec![
                SingleVariantStorage::new(&tm, 64).with_contents(gold(), 10),
                SingleVariantStorage::new(&tm, 64).with_contents(iron(), 30),
                SingleVariantStorage::new(&tm, 64).with_contents(iron(), 30),
            ],
        );
        let target = SlottedStorage::new(&tm, 4, 64);

        let moved =
            move_resources(&chest, &target, |v: &ResourceVariant| v.is_of("iron"), 45, None)
                .unwrap();

        assert_eq!(moved, 45);
        assert_eq!(chest.amount_of(&gold()), 10);
        assert_eq!(chest.amount_of(&iron()), 15);
        assert_eq!(target.amount_of(&iron()), 45);
    }

    #[test]
    fn move_inside_transaction_rolls_back_with_it() {
        let tm = TransactionManager::new();
        let chest = SingleVariantStorage::new(&tm, 64).with_contents(iron(), 20);
        let hopper = SingleVariantStorage::new(&tm, 64);

        let tx = tm.open_outer().unwrap();
        assert_eq!(move_resources(&chest, &hopper, |_| true, 64, Some(&tx)).unwrap(), 20);
        assert_eq!(hopper.amount_of(&iron()), 20);
        tx.close().unwrap();

        assert_eq!(chest.amount_of(&iron()), 20);
        assert!(hopper.is_empty());
    }

    #[test]
    fn move_into_filtered_target_moves_nothing() {
        let tm = TransactionManager::new();
        let chest = SingleVariantStorage::new(&tm, 64).with_contents(iron(), 20);
        let gold_only =
            FilteringStorage::with_filter(SingleVariantStorage::new(&tm, 64), |v: &ResourceVariant| {
                *v == gold()
            });

        assert_eq!(move_resources(&chest, &gold_only, |_| true, 64, None).unwrap(), 0);
        assert_eq!(chest.amount_of(&iron()), 20);
    }

    /// A storage whose simulation promises more than extraction delivers.
    struct Leaky(SingleVariantStorage<ResourceVariant>);

    impl Storage<ResourceVariant> for Leaky {
        fn manager(&self) -> &TransactionManager {
            self.0.manager()
        }

        fn insert(
            &self,
            variant: &ResourceVariant,
            max_amount: u64,
            tx: Option<&Transaction<'_>>,
        ) -> TransferResult<u64> {
            self.0.insert(variant, max_amount, tx)
        }

        fn extract(
            &self,
            variant: &ResourceVariant,
            max_amount: u64,
            tx: Option<&Transaction<'_>>,
        ) -> TransferResult<u64> {
            Ok(self.0.extract(variant, max_amount, tx)? / 2)
        }

        fn simulate_extract(
            &self,
            _variant: &ResourceVariant,
            max_amount: u64,
            _tx: Option<&Transaction<'_>>,
        ) -> TransferResult<u64> {
            Ok(max_amount)
        }

        fn views(&self) -> Vec<ViewSnapshot<ResourceVariant>> {
            self.0.views()
        }

        fn capacity_for(&self, variant: &ResourceVariant) -> u64 {
            self.0.capacity_for(variant)
        }
    }

    #[test]
    fn disagreeing_source_is_rolled_back() {
        let tm = TransactionManager::new();
        let source = Leaky(SingleVariantStorage::new(&tm, 64).with_contents(iron(), 20));
        let target = SingleVariantStorage::new(&tm, 64);

        assert_eq!(move_resources(&source, &target, |_| true, 10, None).unwrap(), 0);
        assert_eq!(source.amount_of(&iron()), 20);
        assert!(target.is_empty());
    }

    #[test]
    fn find_first_matching() {
        let tm = TransactionManager::new();
        let chest = SlottedStorage::from_slots(
            &tm,
            vec![
                SingleVariantStorage::new(&tm, 64),
                SingleVariantStorage::new(&tm, 64).with_contents(iron(), 1),
                SingleVariantStorage::new(&tm, 64).with_contents(gold(), 1),
            ],
        );

        assert_eq!(find_stored_resource(&chest, |_| true), Some(iron()));
        assert_eq!(
            find_stored_resource(&chest, |v: &ResourceVariant| v.is_of("gold")),
            Some(gold())
        );
        assert_eq!(
            find_stored_resource(&chest, |v: &ResourceVariant| v.is_of("tin")),
            None
        );
    }

    #[test]
    fn fill_ratio_averages_slots() {
        let tm = TransactionManager::new();
        let chest = SlottedStorage::from_slots(
            &tm,
            vec![
                SingleVariantStorage::new(&tm, 64).with_contents(iron(), 64),
                SingleVariantStorage::new(&tm, 64).with_contents(gold(), 32),
                SingleVariantStorage::new(&tm, 64),
                SingleVariantStorage::new(&tm, 64),
            ],
        );

        assert!((fill_ratio(&chest) - 0.375).abs() < f64::EPSILON);
        assert_eq!(fill_ratio(&SlottedStorage::<ResourceVariant>::new(&tm, 0, 1)), 0.0);
    }
}
