//! Scripted transfer scenarios.
//!
//! A scenario is a set of slotted storages plus a tree of steps run inside
//! one root transaction. Nested steps open child transactions, so a script
//! can exercise commit propagation and rollback at any depth.
//!
//! The runner checks the transactional guarantees as it goes:
//! - every aborted scope leaves all storages exactly as it found them
//! - simulations never change any storage
//! - amounts with an `expect` match what the storage returned

use holdfast_storage::{
    move_resources, FilteringStorage, ResourceVariant, SingleVariantStorage, SlottedStorage,
    Storage, ViewSnapshot,
};
use holdfast_txn::{Transaction, TransactionManager, TransferError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Contents of one slot in a scenario script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotContents {
    /// Resource kind.
    pub kind: String,
    /// Amount held.
    pub amount: u64,
}

impl SlotContents {
    /// Creates slot contents.
    pub fn new(kind: impl Into<String>, amount: u64) -> Self {
        Self {
            kind: kind.into(),
            amount,
        }
    }

    fn variant(&self) -> ResourceVariant {
        ResourceVariant::of(self.kind.as_str())
    }
}

/// Layout of one storage in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    /// Number of slots.
    pub slots: usize,
    /// Capacity of every slot.
    pub capacity: u64,
    /// Only this kind may be inserted or extracted, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepts: Option<String>,
    /// Starting contents, by slot. Missing entries are empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial: Vec<Option<SlotContents>>,
}

impl StorageSpec {
    /// Creates an empty storage layout.
    pub fn new(slots: usize, capacity: u64) -> Self {
        Self {
            slots,
            capacity,
            accepts: None,
            initial: Vec::new(),
        }
    }

    /// Restricts the storage to one kind.
    #[must_use]
    pub fn accepting(mut self, kind: impl Into<String>) -> Self {
        self.accepts = Some(kind.into());
        self
    }

    /// Sets the starting contents.
    #[must_use]
    pub fn with_initial(mut self, initial: Vec<Option<SlotContents>>) -> Self {
        self.initial = initial;
        self
    }
}

/// One step of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Inserts into a storage.
    Insert {
        /// Storage index.
        storage: usize,
        /// Resource kind.
        kind: String,
        /// Maximum amount.
        amount: u64,
        /// Expected accepted amount.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<u64>,
    },
    /// Extracts from a storage.
    Extract {
        /// Storage index.
        storage: usize,
        /// Resource kind.
        kind: String,
        /// Maximum amount.
        amount: u64,
        /// Expected extracted amount.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<u64>,
    },
    /// Simulates an insertion.
    SimulateInsert {
        /// Storage index.
        storage: usize,
        /// Resource kind.
        kind: String,
        /// Maximum amount.
        amount: u64,
        /// Expected accepted amount.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<u64>,
    },
    /// Simulates an extraction.
    SimulateExtract {
        /// Storage index.
        storage: usize,
        /// Resource kind.
        kind: String,
        /// Maximum amount.
        amount: u64,
        /// Expected extracted amount.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<u64>,
    },
    /// Moves any resources from one storage to another.
    Move {
        /// Source storage index.
        from: usize,
        /// Target storage index.
        to: usize,
        /// Maximum total amount.
        max: u64,
        /// Expected moved amount.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<u64>,
    },
    /// Runs steps in a child transaction.
    Nested {
        /// Whether the child commits.
        commit: bool,
        /// Steps run in the child.
        steps: Vec<ScenarioStep>,
    },
}

impl ScenarioStep {
    fn label(&self) -> String {
        match self {
            Self::Insert {
                storage,
                kind,
                amount,
                ..
            } => format!("insert {amount} {kind} into #{storage}"),
            Self::Extract {
                storage,
                kind,
                amount,
                ..
            } => format!("extract {amount} {kind} from #{storage}"),
            Self::SimulateInsert {
                storage,
                kind,
                amount,
                ..
            } => format!("simulate inserting {amount} {kind} into #{storage}"),
            Self::SimulateExtract {
                storage,
                kind,
                amount,
                ..
            } => format!("simulate extracting {amount} {kind} from #{storage}"),
            Self::Move { from, to, max, .. } => format!("move up to {max} from #{from} to #{to}"),
            Self::Nested { commit, steps } => {
                format!("nested scope of {} steps (commit: {commit})", steps.len())
            }
        }
    }
}

/// Net effect of committed steps on the total amount stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepTally {
    /// Total accepted by committed insertions.
    pub inserted: u64,
    /// Total removed by committed extractions.
    pub extracted: u64,
}

impl StepTally {
    fn absorb(&mut self, other: StepTally) {
        self.inserted += other.inserted;
        self.extracted += other.extracted;
    }

    /// Returns the total a world should hold after starting from `before`.
    #[must_use]
    pub fn apply_to(&self, before: u64) -> u64 {
        before + self.inserted - self.extracted
    }
}

/// Failure of a scenario run.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A storage or transaction call failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// A step referenced a storage that does not exist.
    #[error("no storage at index {0}")]
    UnknownStorage(usize),

    /// A step returned a different amount than expected.
    #[error("{step}: expected {expected}, got {actual}")]
    UnexpectedAmount {
        /// Step description.
        step: String,
        /// Expected amount.
        expected: u64,
        /// Returned amount.
        actual: u64,
    },

    /// An aborted scope left a storage changed.
    #[error("aborted scope left storage #{storage} changed")]
    RollbackMismatch {
        /// Storage index.
        storage: usize,
    },

    /// A simulation changed a storage.
    #[error("{step} changed storage #{storage}")]
    SimulationSideEffect {
        /// Step description.
        step: String,
        /// Storage index.
        storage: usize,
    },

    /// Final contents differ from the expected contents.
    #[error("storage #{storage} holds {actual:?}, expected {expected:?}")]
    ContentsMismatch {
        /// Storage index.
        storage: usize,
        /// Expected contents.
        expected: Vec<SlotContents>,
        /// Actual contents.
        actual: Vec<SlotContents>,
    },
}

/// Result type for scenario runs.
pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// Storage type used by scenarios.
pub type ScenarioStorage = FilteringStorage<ResourceVariant, SlottedStorage<ResourceVariant>>;

type WorldSnapshot = Vec<Vec<ViewSnapshot<ResourceVariant>>>;

/// Storages a scenario runs against.
#[derive(Debug)]
pub struct ScenarioWorld {
    manager: TransactionManager,
    storages: Vec<ScenarioStorage>,
}

impl ScenarioWorld {
    /// Builds storages from their layouts.
    pub fn build(manager: &TransactionManager, specs: &[StorageSpec]) -> Self {
        let storages = specs
            .iter()
            .map(|spec| build_storage(manager, spec))
            .collect();
        Self {
            manager: manager.clone(),
            storages,
        }
    }

    /// Returns the manager.
    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Returns all storages.
    pub fn storages(&self) -> &[ScenarioStorage] {
        &self.storages
    }

    /// Returns the storage at `index`.
    pub fn storage(&self, index: usize) -> ScenarioResult<&ScenarioStorage> {
        self.storages
            .get(index)
            .ok_or(ScenarioError::UnknownStorage(index))
    }

    /// Returns the non-blank contents of every storage.
    pub fn contents(&self) -> Vec<Vec<SlotContents>> {
        self.storages
            .iter()
            .map(|storage| {
                storage
                    .contents()
                    .iter()
                    .map(|held| {
                        SlotContents::new(held.variant().kind().unwrap_or_default(), held.amount())
                    })
                    .collect()
            })
            .collect()
    }

    /// Returns the total amount held across all storages.
    pub fn total(&self) -> u64 {
        self.storages
            .iter()
            .flat_map(|storage| storage.views())
            .map(|view| view.amount)
            .sum()
    }

    /// Runs `steps` in a new root transaction.
    ///
    /// Returns the tally of what the root committed, which is empty when
    /// `commit` is false.
    pub fn run_root(&self, commit: bool, steps: &[ScenarioStep]) -> ScenarioResult<StepTally> {
        let before = self.snapshot();
        let root = self.manager.open_outer()?;
        let tally = self.apply(&root, steps)?;
        if commit {
            root.commit()?;
        }
        root.close()?;

        if commit {
            Ok(tally)
        } else {
            self.ensure_unchanged(&before)?;
            Ok(StepTally::default())
        }
    }

    /// Runs `steps` in `tx`.
    pub fn apply(&self, tx: &Transaction<'_>, steps: &[ScenarioStep]) -> ScenarioResult<StepTally> {
        let mut tally = StepTally::default();
        for step in steps {
            tally.absorb(self.apply_step(tx, step)?);
        }
        Ok(tally)
    }

    /// Compares the contents against `expected`, storage by storage.
    pub fn check_contents(&self, expected: &[Vec<SlotContents>]) -> ScenarioResult<()> {
        let actual = self.contents();
        for (storage, actual) in actual.into_iter().enumerate() {
            let expected = expected.get(storage).cloned().unwrap_or_default();
            if actual != expected {
                return Err(ScenarioError::ContentsMismatch {
                    storage,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn apply_step(&self, tx: &Transaction<'_>, step: &ScenarioStep) -> ScenarioResult<StepTally> {
        match step {
            ScenarioStep::Insert {
                storage,
                kind,
                amount,
                expect,
            } => {
                let variant = ResourceVariant::of(kind.as_str());
                let actual = self.storage(*storage)?.insert(&variant, *amount, Some(tx))?;
                check_expected(step, *expect, actual)?;
                Ok(StepTally {
                    inserted: actual,
                    extracted: 0,
                })
            }
            ScenarioStep::Extract {
                storage,
                kind,
                amount,
                expect,
            } => {
                let variant = ResourceVariant::of(kind.as_str());
                let actual = self.storage(*storage)?.extract(&variant, *amount, Some(tx))?;
                check_expected(step, *expect, actual)?;
                Ok(StepTally {
                    inserted: 0,
                    extracted: actual,
                })
            }
            ScenarioStep::SimulateInsert {
                storage,
                kind,
                amount,
                expect,
            } => {
                let before = self.snapshot();
                let variant = ResourceVariant::of(kind.as_str());
                let actual = self
                    .storage(*storage)?
                    .simulate_insert(&variant, *amount, Some(tx))?;
                self.ensure_no_side_effect(step, &before)?;
                check_expected(step, *expect, actual)?;
                Ok(StepTally::default())
            }
            ScenarioStep::SimulateExtract {
                storage,
                kind,
                amount,
                expect,
            } => {
                let before = self.snapshot();
                let variant = ResourceVariant::of(kind.as_str());
                let actual = self
                    .storage(*storage)?
                    .simulate_extract(&variant, *amount, Some(tx))?;
                self.ensure_no_side_effect(step, &before)?;
                check_expected(step, *expect, actual)?;
                Ok(StepTally::default())
            }
            ScenarioStep::Move {
                from,
                to,
                max,
                expect,
            } => {
                let actual = move_resources(
                    self.storage(*from)?,
                    self.storage(*to)?,
                    |_| true,
                    *max,
                    Some(tx),
                )?;
                check_expected(step, *expect, actual)?;
                Ok(StepTally::default())
            }
            ScenarioStep::Nested { commit, steps } => {
                let before = self.snapshot();
                let nested = tx.open_nested()?;
                let tally = self.apply(&nested, steps)?;
                if *commit {
                    nested.commit()?;
                }
                nested.close()?;

                if *commit {
                    Ok(tally)
                } else {
                    self.ensure_unchanged(&before)?;
                    Ok(StepTally::default())
                }
            }
        }
    }

    fn snapshot(&self) -> WorldSnapshot {
        self.storages.iter().map(|storage| storage.views()).collect()
    }

    fn changed_storage(&self, before: &WorldSnapshot) -> Option<usize> {
        self.snapshot()
            .iter()
            .zip(before)
            .position(|(now, then)| now != then)
    }

    fn ensure_unchanged(&self, before: &WorldSnapshot) -> ScenarioResult<()> {
        match self.changed_storage(before) {
            Some(storage) => Err(ScenarioError::RollbackMismatch { storage }),
            None => Ok(()),
        }
    }

    fn ensure_no_side_effect(&self, step: &ScenarioStep, before: &WorldSnapshot) -> ScenarioResult<()> {
        match self.changed_storage(before) {
            Some(storage) => Err(ScenarioError::SimulationSideEffect {
                step: step.label(),
                storage,
            }),
            None => Ok(()),
        }
    }
}

fn build_storage(manager: &TransactionManager, spec: &StorageSpec) -> ScenarioStorage {
    let slots = (0..spec.slots)
        .map(|index| {
            let slot = SingleVariantStorage::new(manager, spec.capacity);
            match spec.initial.get(index) {
                Some(Some(contents)) => slot.with_contents(contents.variant(), contents.amount),
                _ => slot,
            }
        })
        .collect();
    let slotted = SlottedStorage::from_slots(manager, slots);

    match spec.accepts.clone() {
        Some(kind) => FilteringStorage::with_filter(slotted, move |variant: &ResourceVariant| {
            variant.is_of(&kind)
        }),
        None => FilteringStorage::with_filter(slotted, |_| true),
    }
}

fn check_expected(step: &ScenarioStep, expected: Option<u64>, actual: u64) -> ScenarioResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(ScenarioError::UnexpectedAmount {
            step: step.label(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}
