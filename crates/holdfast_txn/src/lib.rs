//! # Holdfast Transactions
//!
//! Nested, thread-affine transactions for resource accounting.
//!
//! This crate provides:
//! - [`TransactionManager`], the per-thread stack of open transactions
//! - [`Transaction`], a scoped handle that closes (and rolls back unless
//!   committed) when dropped
//! - [`SnapshotParticipant`], the snapshot/rollback protocol that stateful
//!   storages use to take part in a transaction
//!
//! ## Example
//!
//! ```rust
//! use holdfast_txn::{SnapshotParticipant, TransactionManager};
//!
//! let manager = TransactionManager::new();
//! let counter = SnapshotParticipant::new(&manager, 0u32);
//!
//! {
//!     let tx = manager.open_outer().unwrap();
//!     counter.update(&tx, |value| *value += 5).unwrap();
//!     // dropped without commit: rolled back
//! }
//! assert_eq!(counter.get(), 0);
//!
//! let tx = manager.open_outer().unwrap();
//! counter.update(&tx, |value| *value += 5).unwrap();
//! tx.commit().unwrap();
//! tx.close().unwrap();
//! assert_eq!(counter.get(), 5);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod participant;
mod transaction;
mod types;

pub use config::ManagerConfig;
pub use error::{CallbackError, CallbackResult, TransferError, TransferResult};
pub use participant::SnapshotParticipant;
pub use transaction::{Transaction, TransactionManager};
pub use types::{Lifecycle, TransactionId, TransactionResult};
