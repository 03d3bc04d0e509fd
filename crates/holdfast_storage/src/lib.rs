//! # Holdfast Storage
//!
//! Transactional resource storages built on [`holdfast_txn`].
//!
//! A storage holds amounts of resource variants and moves them only inside
//! a transaction. Every mutation enlists the storage in the transaction it
//! was made in, so closing that transaction without committing puts the
//! storage back exactly as it was.
//!
//! ## Storages
//!
//! - [`SingleVariantStorage`] - one `(variant, amount)` pair with a capacity
//! - [`SlottedStorage`] - an ordered list of single-variant slots
//! - [`FilteringStorage`] - gates insertion and extraction of another storage
//! - [`CombinedStorage`] - presents several storages as one
//!
//! ## Example
//!
//! ```rust
//! use holdfast_storage::{ResourceVariant, SingleVariantStorage, Storage};
//! use holdfast_txn::TransactionManager;
//!
//! let tm = TransactionManager::new();
//! let tank = SingleVariantStorage::new(&tm, 1000);
//! let water = ResourceVariant::of("water");
//!
//! let tx = tm.open_outer().unwrap();
//! assert_eq!(tank.insert(&water, 1500, Some(&tx)).unwrap(), 1000);
//! tx.commit().unwrap();
//! tx.close().unwrap();
//!
//! assert_eq!(tank.amount_of(&water), 1000);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod amount;
mod combined;
mod filtering;
mod single;
mod slotted;
mod storage;
mod transfer;
mod variant;

pub use amount::ResourceAmount;
pub use combined::CombinedStorage;
pub use filtering::FilteringStorage;
pub use single::SingleVariantStorage;
pub use slotted::SlottedStorage;
pub use storage::{Storage, StorageView, ViewSnapshot};
pub use transfer::{fill_ratio, find_stored_resource, move_resources};
pub use variant::{ResourceVariant, TransferVariant};
