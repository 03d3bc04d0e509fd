//! Test fixtures and storage helpers.
//!
//! Provides a manager with convenience constructors for the storages most
//! tests need, plus tracing setup for tests that want log output.

use holdfast_storage::{FilteringStorage, ResourceVariant, SingleVariantStorage, SlottedStorage};
use holdfast_txn::{ManagerConfig, TransactionManager};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test tracing subscriber once per process.
///
/// Output is filtered by `RUST_LOG` and defaults to warnings.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Returns the `water` variant.
pub fn water() -> ResourceVariant {
    ResourceVariant::of("water")
}

/// Returns the `lava` variant.
pub fn lava() -> ResourceVariant {
    ResourceVariant::of("lava")
}

/// A transaction manager with storage constructors.
#[derive(Debug, Clone, Default)]
pub struct TestWorld {
    /// The manager every storage of this world is bound to.
    pub manager: TransactionManager,
}

impl TestWorld {
    /// Creates a world with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a world with a custom configuration.
    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            manager: TransactionManager::with_config(config),
        }
    }

    /// Creates an empty tank.
    pub fn tank(&self, capacity: u64) -> SingleVariantStorage<ResourceVariant> {
        SingleVariantStorage::new(&self.manager, capacity)
    }

    /// Creates a tank that only accepts lava.
    pub fn lava_tank(&self, capacity: u64) -> SingleVariantStorage<ResourceVariant> {
        self.tank(capacity)
            .with_insert_filter(|variant: &ResourceVariant| variant.is_of("lava"))
    }

    /// Creates an empty slotted inventory.
    pub fn inventory(&self, slots: usize, capacity: u64) -> SlottedStorage<ResourceVariant> {
        SlottedStorage::new(&self.manager, slots, capacity)
    }

    /// Creates an inventory that can only be read.
    pub fn display_case(
        &self,
        slots: usize,
        capacity: u64,
    ) -> FilteringStorage<ResourceVariant, SlottedStorage<ResourceVariant>> {
        FilteringStorage::read_only(self.inventory(slots, capacity))
    }
}

impl std::ops::Deref for TestWorld {
    type Target = TransactionManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

/// Runs a test with a fresh world.
///
/// # Example
///
/// ```rust
/// use holdfast_testkit::{water, with_world};
/// use holdfast_storage::Storage;
///
/// with_world(|world| {
///     let tank = world.tank(100);
///     assert_eq!(tank.simulate_insert(&water(), 250, None).unwrap(), 100);
/// });
/// ```
pub fn with_world<F, R>(f: F) -> R
where
    F: FnOnce(&TestWorld) -> R,
{
    init_tracing();
    let world = TestWorld::new();
    f(&world)
}

/// Counts final commits of a storage.
pub fn count_final_commits(storage: &SingleVariantStorage<ResourceVariant>) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let seen = Rc::clone(&count);
    storage.on_final_commit(move |_| seen.set(seen.get() + 1));
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_storage::Storage;

    #[test]
    fn world_storages_share_the_manager() {
        with_world(|world| {
            let tank = world.tank(10);
            let tx = world.open_outer().unwrap();
            assert_eq!(tank.insert(&water(), 4, Some(&tx)).unwrap(), 4);
            assert!(tank.manager().ptr_eq(&world.manager));
        });
    }

    #[test]
    fn lava_tank_only_takes_lava() {
        with_world(|world| {
            let tank = world.lava_tank(10);
            assert_eq!(tank.simulate_insert(&water(), 4, None).unwrap(), 0);
            assert_eq!(tank.simulate_insert(&lava(), 4, None).unwrap(), 4);
        });
    }

    #[test]
    fn final_commit_counter() {
        with_world(|world| {
            let tank = world.tank(10);
            let commits = count_final_commits(&tank);

            world.run_outer(|tx| tank.insert(&water(), 1, Some(tx))).unwrap();
            world.run_outer(|tx| tank.insert(&water(), 1, Some(tx))).unwrap();

            assert_eq!(commits.get(), 2);
        });
    }

    #[test]
    fn display_case_rejects_changes() {
        with_world(|world| {
            let case = world.display_case(3, 1);
            assert!(!case.supports_insertion());
            assert_eq!(case.simulate_insert(&water(), 1, None).unwrap(), 0);
        });
    }
}
