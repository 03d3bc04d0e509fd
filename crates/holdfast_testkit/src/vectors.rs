//! Scenario test vectors.
//!
//! Vectors are plain JSON so that hosts embedding the engine can replay the
//! same scripts against their own storages.

use crate::scenario::{ScenarioResult, ScenarioStep, ScenarioWorld, SlotContents, StorageSpec};
use holdfast_txn::TransactionManager;
use serde::{Deserialize, Serialize};

/// A replayable transfer scenario with its expected outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Storages the scenario starts with.
    pub storages: Vec<StorageSpec>,
    /// Whether the root transaction commits.
    pub commit: bool,
    /// Steps run inside the root transaction.
    pub steps: Vec<ScenarioStep>,
    /// Non-blank contents of each storage after the root closes.
    pub expected: Vec<Vec<SlotContents>>,
}

impl ScenarioVector {
    /// Replays the vector on a fresh manager and checks the outcome.
    pub fn run(&self) -> ScenarioResult<()> {
        let manager = TransactionManager::new();
        let world = ScenarioWorld::build(&manager, &self.storages);
        world.run_root(self.commit, &self.steps)?;
        world.check_contents(&self.expected)
    }
}

fn insert(storage: usize, kind: &str, amount: u64, expect: u64) -> ScenarioStep {
    ScenarioStep::Insert {
        storage,
        kind: kind.into(),
        amount,
        expect: Some(expect),
    }
}

fn extract(storage: usize, kind: &str, amount: u64, expect: u64) -> ScenarioStep {
    ScenarioStep::Extract {
        storage,
        kind: kind.into(),
        amount,
        expect: Some(expect),
    }
}

fn nested(commit: bool, steps: Vec<ScenarioStep>) -> ScenarioStep {
    ScenarioStep::Nested { commit, steps }
}

/// Transaction semantics vectors.
pub fn transaction_vectors() -> Vec<ScenarioVector> {
    vec![
        ScenarioVector {
            id: "nested_insert_rolled_back_by_root".into(),
            description: "A committed nested insert is undone when the root aborts".into(),
            storages: vec![StorageSpec::new(1, 4000)],
            commit: false,
            steps: vec![nested(true, vec![insert(0, "water", 1000, 1000)])],
            expected: vec![vec![]],
        },
        ScenarioVector {
            id: "nested_commit_reaches_root".into(),
            description: "Commits at every depth keep the change".into(),
            storages: vec![StorageSpec::new(1, 100)],
            commit: true,
            steps: vec![nested(
                true,
                vec![nested(true, vec![insert(0, "water", 5, 5)])],
            )],
            expected: vec![vec![SlotContents::new("water", 5)]],
        },
        ScenarioVector {
            id: "aborted_child_in_committed_root".into(),
            description: "Only the aborted child's changes are undone".into(),
            storages: vec![StorageSpec::new(1, 100)],
            commit: true,
            steps: vec![
                insert(0, "water", 10, 10),
                nested(false, vec![insert(0, "water", 20, 20)]),
                insert(0, "water", 1, 1),
            ],
            expected: vec![vec![SlotContents::new("water", 11)]],
        },
        ScenarioVector {
            id: "simulation_has_no_effect".into(),
            description: "Simulated transfers report amounts without changing anything".into(),
            storages: vec![StorageSpec::new(1, 50).with_initial(vec![Some(SlotContents::new("oil", 20))])],
            commit: true,
            steps: vec![
                ScenarioStep::SimulateInsert {
                    storage: 0,
                    kind: "oil".into(),
                    amount: 100,
                    expect: Some(30),
                },
                ScenarioStep::SimulateExtract {
                    storage: 0,
                    kind: "oil".into(),
                    amount: 100,
                    expect: Some(20),
                },
            ],
            expected: vec![vec![SlotContents::new("oil", 20)]],
        },
    ]
}

/// Storage behavior vectors.
pub fn storage_vectors() -> Vec<ScenarioVector> {
    vec![
        ScenarioVector {
            id: "lava_tank_rejects_water".into(),
            description: "A filtered tank returns 0 for other kinds".into(),
            storages: vec![StorageSpec::new(1, 4000).accepting("lava")],
            commit: true,
            steps: vec![insert(0, "water", 1000, 0), insert(0, "lava", 1000, 1000)],
            expected: vec![vec![SlotContents::new("lava", 1000)]],
        },
        ScenarioVector {
            id: "slotted_fill_order".into(),
            description: "Matching slots fill before blank slots".into(),
            storages: vec![StorageSpec::new(3, 64).with_initial(vec![
                None,
                Some(SlotContents::new("dirt", 10)),
                Some(SlotContents::new("stone", 60)),
            ])],
            commit: true,
            steps: vec![insert(0, "stone", 70, 68)],
            expected: vec![vec![
                SlotContents::new("stone", 64),
                SlotContents::new("dirt", 10),
                SlotContents::new("stone", 64),
            ]],
        },
        ScenarioVector {
            id: "emptied_slot_accepts_new_kind".into(),
            description: "Extracting everything resets a slot to blank".into(),
            storages: vec![StorageSpec::new(1, 10).with_initial(vec![Some(SlotContents::new("sand", 4))])],
            commit: true,
            steps: vec![
                insert(0, "gravel", 1, 0),
                extract(0, "sand", 10, 4),
                insert(0, "gravel", 3, 3),
            ],
            expected: vec![vec![SlotContents::new("gravel", 3)]],
        },
        ScenarioVector {
            id: "move_between_storages".into(),
            description: "Moving is limited by what the target accepts".into(),
            storages: vec![
                StorageSpec::new(1, 64).with_initial(vec![Some(SlotContents::new("iron", 40))]),
                StorageSpec::new(1, 16),
            ],
            commit: true,
            steps: vec![ScenarioStep::Move {
                from: 0,
                to: 1,
                max: 64,
                expect: Some(16),
            }],
            expected: vec![
                vec![SlotContents::new("iron", 24)],
                vec![SlotContents::new("iron", 16)],
            ],
        },
    ]
}

/// Returns every built-in vector.
pub fn all_vectors() -> Vec<ScenarioVector> {
    let mut vectors = transaction_vectors();
    vectors.extend(storage_vectors());
    vectors
}

/// Serializes every built-in vector as pretty JSON.
pub fn all_vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

/// Parses vectors from JSON.
pub fn vectors_from_json(json: &str) -> serde_json::Result<Vec<ScenarioVector>> {
    serde_json::from_str(json)
}
