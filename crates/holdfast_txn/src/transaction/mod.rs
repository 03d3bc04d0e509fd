//! Nested transactions.
//!
//! A transaction tree lives on one manager's stack:
//! - **Root**: opened with [`TransactionManager::open_outer`]
//! - **Nested**: opened from the current transaction with
//!   [`Transaction::open_nested`]
//! - **Close callbacks** run when their own transaction closes
//! - **Outer close callbacks** run once, when the root closes

mod handle;
mod manager;
mod state;

pub use handle::Transaction;
pub use manager::TransactionManager;
