//! Soak tests for the transaction engine.
//!
//! A soak run replays many generated root transactions against one long
//! lived world and checks after each round that the world holds exactly
//! what the committed steps put there.

use crate::generators::{scenario_strategy, step_strategy};
use crate::scenario::ScenarioWorld;
use holdfast_txn::{Lifecycle, TransactionManager};
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::TestRunner;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of a soak run.
#[derive(Debug, Clone)]
pub struct SoakReport {
    /// Rounds run.
    pub rounds: usize,
    /// Rounds whose root committed.
    pub committed: usize,
    /// Rounds whose root aborted.
    pub aborted: usize,
    /// Descriptions of every broken guarantee.
    pub violations: Vec<String>,
    /// Total duration.
    pub duration: Duration,
    /// Rounds per second.
    pub rounds_per_second: f64,
}

impl SoakReport {
    fn new(committed: usize, aborted: usize, violations: Vec<String>, duration: Duration) -> Self {
        let rounds = committed + aborted;
        let rounds_per_second = if duration.as_secs_f64() > 0.0 {
            rounds as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            rounds,
            committed,
            aborted,
            violations,
            duration,
            rounds_per_second,
        }
    }

    /// Returns `true` if no guarantee was broken.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Rounds: {}", self.rounds);
        println!("Committed: {}", self.committed);
        println!("Aborted: {}", self.aborted);
        println!("Violations: {}", self.violations.len());
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} rounds/sec", self.rounds_per_second);
    }
}

/// Configuration for soak runs.
#[derive(Debug, Clone)]
pub struct SoakConfig {
    /// Number of root transactions to run.
    pub rounds: usize,
    /// Maximum top-level steps per round.
    pub max_steps: usize,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            rounds: 1_000,
            max_steps: 12,
        }
    }
}

/// Runs a deterministic soak.
///
/// The storage layout is generated once; every round then runs a fresh
/// batch of generated steps in a root that randomly commits or aborts.
pub fn run_soak(config: &SoakConfig) -> SoakReport {
    let mut runner = TestRunner::deterministic();
    let start = Instant::now();
    let mut committed = 0usize;
    let mut aborted = 0usize;
    let mut violations = Vec::new();

    let layout = match scenario_strategy().new_tree(&mut runner) {
        Ok(tree) => tree.current().storages,
        Err(reason) => {
            violations.push(format!("could not generate a layout: {reason}"));
            return SoakReport::new(0, 0, violations, start.elapsed());
        }
    };
    let manager = TransactionManager::new();
    let world = ScenarioWorld::build(&manager, &layout);
    let rounds = (
        proptest::bool::ANY,
        proptest::collection::vec(step_strategy(layout.len()), 0..=config.max_steps),
    );

    for round in 0..config.rounds {
        let (commit, steps) = match rounds.new_tree(&mut runner) {
            Ok(tree) => tree.current(),
            Err(reason) => {
                violations.push(format!("round {round}: could not generate steps: {reason}"));
                break;
            }
        };

        let before = world.total();
        match world.run_root(commit, &steps) {
            Ok(tally) => {
                let expected = tally.apply_to(before);
                if world.total() != expected {
                    violations.push(format!(
                        "round {round}: world holds {}, committed steps give {expected}",
                        world.total()
                    ));
                }
            }
            Err(err) => {
                warn!(round, error = %err, "soak round failed");
                violations.push(format!("round {round}: {err}"));
            }
        }
        if manager.lifecycle() != Lifecycle::None {
            violations.push(format!(
                "round {round}: manager left in {:?}",
                manager.lifecycle()
            ));
        }

        if commit {
            committed += 1;
        } else {
            aborted += 1;
        }
    }

    debug!(committed, aborted, violations = violations.len(), "soak finished");
    SoakReport::new(committed, aborted, violations, start.elapsed())
}
