//! Property tests for storages.

use holdfast_storage::{
    move_resources, ResourceVariant, SingleVariantStorage, SlottedStorage, Storage,
};
use holdfast_txn::TransactionManager;
use proptest::prelude::*;

fn variant_strategy() -> impl Strategy<Value = ResourceVariant> {
    prop::sample::select(vec!["iron", "gold", "coal"]).prop_map(|kind| ResourceVariant::of(kind))
}

fn slot_strategy() -> impl Strategy<Value = Option<(ResourceVariant, u64)>> {
    prop::option::of((variant_strategy(), 1u64..=32))
}

fn build(
    tm: &TransactionManager,
    layout: &[Option<(ResourceVariant, u64)>],
) -> SlottedStorage<ResourceVariant> {
    let slots = layout
        .iter()
        .map(|slot| {
            let storage = SingleVariantStorage::new(tm, 32);
            match slot {
                Some((variant, amount)) => storage.with_contents(variant.clone(), *amount),
                None => storage,
            }
        })
        .collect();
    SlottedStorage::from_slots(tm, slots)
}

fn total(storage: &SlottedStorage<ResourceVariant>) -> u64 {
    storage.views().iter().map(|view| view.amount).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn simulation_is_pure(
        layout in prop::collection::vec(slot_strategy(), 0..8),
        variant in variant_strategy(),
        amount in 0u64..200,
    ) {
        let tm = TransactionManager::new();
        let storage = build(&tm, &layout);
        let before = storage.views();

        let inserted = storage.simulate_insert(&variant, amount, None).unwrap();
        let extracted = storage.simulate_extract(&variant, amount, None).unwrap();

        prop_assert!(inserted <= amount);
        prop_assert!(extracted <= amount);
        prop_assert_eq!(storage.views(), before);
        prop_assert!(!tm.is_open());
    }

    #[test]
    fn insert_then_extract_restores_single_slot(
        initial in slot_strategy(),
        capacity in 1u64..=64,
        variant in variant_strategy(),
        amount in 0u64..200,
    ) {
        let tm = TransactionManager::new();
        let tank = match initial {
            Some((held, held_amount)) => {
                SingleVariantStorage::new(&tm, capacity).with_contents(held, held_amount)
            }
            None => SingleVariantStorage::new(&tm, capacity),
        };
        let before = tank.views();

        let tx = tm.open_outer().unwrap();
        let inserted = tank.insert(&variant, amount, Some(&tx)).unwrap();
        let extracted = tank.extract(&variant, inserted, Some(&tx)).unwrap();
        tx.commit().unwrap();
        tx.close().unwrap();

        prop_assert_eq!(extracted, inserted);
        prop_assert_eq!(tank.views(), before);
    }

    #[test]
    fn insert_then_extract_keeps_slotted_contents(
        layout in prop::collection::vec(slot_strategy(), 0..8),
        variant in variant_strategy(),
        amount in 0u64..200,
    ) {
        let tm = TransactionManager::new();
        let storage = build(&tm, &layout);
        let before = storage.amount_of(&variant);
        let before_total = total(&storage);

        let tx = tm.open_outer().unwrap();
        let inserted = storage.insert(&variant, amount, Some(&tx)).unwrap();
        let extracted = storage.extract(&variant, inserted, Some(&tx)).unwrap();
        tx.commit().unwrap();
        tx.close().unwrap();

        prop_assert_eq!(extracted, inserted);
        prop_assert_eq!(storage.amount_of(&variant), before);
        prop_assert_eq!(total(&storage), before_total);
    }

    #[test]
    fn simulation_predicts_real_insert(
        layout in prop::collection::vec(slot_strategy(), 0..8),
        variant in variant_strategy(),
        amount in 0u64..200,
    ) {
        let tm = TransactionManager::new();
        let storage = build(&tm, &layout);

        let predicted = storage.simulate_insert(&variant, amount, None).unwrap();
        let tx = tm.open_outer().unwrap();
        let actual = storage.insert(&variant, amount, Some(&tx)).unwrap();

        prop_assert_eq!(predicted, actual);
        prop_assert!(storage.amount_of(&variant) <= storage.capacity_for(&variant));
    }

    #[test]
    fn aborted_root_restores_every_slot(
        layout in prop::collection::vec(slot_strategy(), 1..8),
        ops in prop::collection::vec((any::<bool>(), variant_strategy(), 1u64..64), 1..16),
    ) {
        let tm = TransactionManager::new();
        let storage = build(&tm, &layout);
        let before = storage.views();

        let root = tm.open_outer().unwrap();
        for (insert, variant, amount) in &ops {
            let nested = root.open_nested().unwrap();
            if *insert {
                storage.insert(variant, *amount, Some(&nested)).unwrap();
            } else {
                storage.extract(variant, *amount, Some(&nested)).unwrap();
            }
            nested.commit().unwrap();
            nested.close().unwrap();
        }
        root.close().unwrap();

        prop_assert_eq!(storage.views(), before);
    }

    #[test]
    fn moving_conserves_resources(
        from_layout in prop::collection::vec(slot_strategy(), 1..6),
        to_layout in prop::collection::vec(slot_strategy(), 1..6),
        max_amount in 0u64..300,
    ) {
        let tm = TransactionManager::new();
        let from = build(&tm, &from_layout);
        let to = build(&tm, &to_layout);
        let before = total(&from) + total(&to);

        let moved = move_resources(&from, &to, |_| true, max_amount, None).unwrap();

        prop_assert!(moved <= max_amount);
        prop_assert_eq!(total(&from) + total(&to), before);
    }

    #[test]
    fn each_slot_stays_normalized(
        layout in prop::collection::vec(slot_strategy(), 1..8),
        ops in prop::collection::vec((any::<bool>(), variant_strategy(), 1u64..64), 1..16),
    ) {
        let tm = TransactionManager::new();
        let storage = build(&tm, &layout);

        let tx = tm.open_outer().unwrap();
        for (insert, variant, amount) in &ops {
            if *insert {
                storage.insert(variant, *amount, Some(&tx)).unwrap();
            } else {
                storage.extract(variant, *amount, Some(&tx)).unwrap();
            }
        }

        for view in storage.views() {
            prop_assert_eq!(view.amount == 0, view.resource == ResourceVariant::default());
            prop_assert!(view.amount <= 32);
        }
    }
}
