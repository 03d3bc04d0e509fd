//! Property-based test generators using proptest.
//!
//! Generated scenarios only reference storages that exist, so any failure
//! they trigger is a real protocol or storage bug.

use crate::scenario::{ScenarioStep, SlotContents, StorageSpec};
use proptest::prelude::*;

/// Resource kinds used by generated scenarios.
pub const KINDS: &[&str] = &["water", "lava", "iron", "gold"];

/// Strategy for resource kinds.
pub fn kind_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(KINDS).prop_map(str::to_owned)
}

/// Strategy for storage layouts, some of them filtered to one kind.
pub fn storage_spec_strategy() -> impl Strategy<Value = StorageSpec> {
    (1usize..=4, 1u64..=64)
        .prop_flat_map(|(slots, capacity)| {
            let initial = prop::collection::vec(
                prop::option::of((kind_strategy(), 1..=capacity)),
                0..=slots,
            );
            (
                Just(slots),
                Just(capacity),
                prop::option::weighted(0.25, kind_strategy()),
                initial,
            )
        })
        .prop_map(|(slots, capacity, accepts, initial)| StorageSpec {
            slots,
            capacity,
            accepts,
            initial: initial
                .into_iter()
                .map(|slot| slot.map(|(kind, amount)| SlotContents::new(kind, amount)))
                .collect(),
        })
}

/// Strategy for a single non-nested step over `storages` storages.
pub fn leaf_step_strategy(storages: usize) -> impl Strategy<Value = ScenarioStep> {
    let index = 0..storages.max(1);
    let amount = 0u64..=128;
    prop_oneof![
        3 => (index.clone(), kind_strategy(), amount.clone()).prop_map(|(storage, kind, amount)| {
            ScenarioStep::Insert { storage, kind, amount, expect: None }
        }),
        3 => (index.clone(), kind_strategy(), amount.clone()).prop_map(|(storage, kind, amount)| {
            ScenarioStep::Extract { storage, kind, amount, expect: None }
        }),
        1 => (index.clone(), kind_strategy(), amount.clone()).prop_map(|(storage, kind, amount)| {
            ScenarioStep::SimulateInsert { storage, kind, amount, expect: None }
        }),
        1 => (index.clone(), kind_strategy(), amount.clone()).prop_map(|(storage, kind, amount)| {
            ScenarioStep::SimulateExtract { storage, kind, amount, expect: None }
        }),
        2 => (index.clone(), index, amount).prop_map(|(from, to, max)| {
            ScenarioStep::Move { from, to, max, expect: None }
        }),
    ]
}

/// Strategy for steps that may open nested scopes.
pub fn step_strategy(storages: usize) -> impl Strategy<Value = ScenarioStep> {
    leaf_step_strategy(storages).prop_recursive(4, 48, 6, |inner| {
        (any::<bool>(), prop::collection::vec(inner, 0..6))
            .prop_map(|(commit, steps)| ScenarioStep::Nested { commit, steps })
    })
}

/// A generated scenario.
#[derive(Debug, Clone)]
pub struct GeneratedScenario {
    /// Storage layouts.
    pub storages: Vec<StorageSpec>,
    /// Whether the root commits.
    pub commit: bool,
    /// Steps run in the root.
    pub steps: Vec<ScenarioStep>,
}

/// Strategy for complete scenarios.
pub fn scenario_strategy() -> impl Strategy<Value = GeneratedScenario> {
    prop::collection::vec(storage_spec_strategy(), 1..=4)
        .prop_flat_map(|storages| {
            let count = storages.len();
            (
                Just(storages),
                any::<bool>(),
                prop::collection::vec(step_strategy(count), 0..12),
            )
        })
        .prop_map(|(storages, commit, steps)| GeneratedScenario {
            storages,
            commit,
            steps,
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to generate.
    pub cases: u32,
    /// Maximum number of shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a config for quick tests.
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a config for thorough tests.
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 5000,
        }
    }

    /// Converts to proptest's config.
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
