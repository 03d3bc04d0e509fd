//! Transaction handles.

use crate::error::{CallbackResult, TransferError, TransferResult};
use crate::transaction::TransactionManager;
use crate::types::{TransactionId, TransactionResult};
use std::fmt;
use std::marker::PhantomData;
use tracing::{error, warn};

/// A handle to one transaction in the nesting tree.
///
/// Handles returned by [`TransactionManager::open_outer`] and
/// [`Transaction::open_nested`] own their transaction: dropping them
/// closes it, rolling back unless [`Transaction::commit`] was called.
/// A nested handle borrows its parent, so children are always closed
/// before their parents.
///
/// Handles passed to close callbacks or returned by
/// [`TransactionManager::current`] only observe the transaction and do
/// nothing when dropped.
pub struct Transaction<'p> {
    manager: TransactionManager,
    id: TransactionId,
    depth: usize,
    /// Whether dropping this handle closes the transaction.
    owned: bool,
    _parent: PhantomData<&'p ()>,
}

impl<'p> Transaction<'p> {
    pub(crate) fn owned(manager: TransactionManager, id: TransactionId, depth: usize) -> Self {
        Self {
            manager,
            id,
            depth,
            owned: true,
            _parent: PhantomData,
        }
    }

    pub(crate) fn borrowed(manager: TransactionManager, id: TransactionId, depth: usize) -> Self {
        Self {
            manager,
            id,
            depth,
            owned: false,
            _parent: PhantomData,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the nesting depth (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns `true` for the root transaction.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Returns the manager this transaction belongs to.
    #[must_use]
    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Returns `true` while the transaction is on the stack.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.manager.is_frame_open(self.id, self.depth)
    }

    /// Returns `true` if this is the innermost open transaction.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.manager.is_frame_current(self.id, self.depth)
    }

    /// Returns `true` if the transaction is open and marked committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.manager.is_frame_committed(self.id, self.depth)
    }

    /// Fails unless this is the innermost open transaction and no close is
    /// in progress.
    pub fn ensure_current(&self) -> TransferResult<()> {
        self.manager.ensure_frame_current(self.id, self.depth)
    }

    /// Opens a child transaction.
    ///
    /// # Errors
    ///
    /// - [`TransferError::NotCurrent`] if this is not the innermost transaction
    /// - [`TransferError::Closed`] if this transaction was closed
    /// - [`TransferError::DepthLimitExceeded`] past the configured depth
    pub fn open_nested(&self) -> TransferResult<Transaction<'_>> {
        self.manager.open_nested_from(self.id, self.depth)
    }

    /// Marks the transaction committed.
    ///
    /// Nothing is applied yet: the outcome is decided when the transaction
    /// closes, and a committed child still rolls back if an ancestor aborts.
    pub fn commit(&self) -> TransferResult<()> {
        self.manager.commit_frame(self.id, self.depth)
    }

    /// Closes the transaction and runs its close callbacks.
    ///
    /// Closing the root also runs every outer close callback of the tree.
    pub fn close(mut self) -> TransferResult<TransactionResult> {
        self.owned = false;
        self.manager.close_frame(self.id, self.depth)
    }

    /// Returns a non-closing handle to the parent transaction.
    #[must_use]
    pub fn parent(&self) -> Option<Transaction<'_>> {
        let depth = self.depth.checked_sub(1)?;
        self.manager.open_transaction(depth).ok()
    }

    /// Registers a callback run when this transaction closes.
    ///
    /// Callbacks run in registration order and receive the transaction's
    /// own result. Registration works on any open transaction, not only
    /// the current one.
    pub fn add_close_callback<F>(&self, callback: F) -> TransferResult<()>
    where
        F: FnOnce(&Transaction<'_>, TransactionResult) -> CallbackResult + 'static,
    {
        self.manager
            .add_close_callback(self.id, self.depth, Box::new(callback))
    }

    /// Registers a callback run once the root transaction closes.
    ///
    /// May be called at any depth, including from this transaction's own
    /// close callbacks. The callback receives the root's result.
    pub fn add_outer_close_callback<F>(&self, callback: F) -> TransferResult<()>
    where
        F: FnOnce(TransactionResult) -> CallbackResult + 'static,
    {
        self.manager
            .add_outer_close_callback(self.id, self.depth, Box::new(callback))
    }

    /// Runs `f` in a child transaction, committing it if `f` succeeds.
    pub fn run_nested<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<TransferError>,
    {
        self.open_nested()?.run_scoped(f)
    }

    pub(crate) fn run_scoped<T, E, F>(self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<TransferError>,
    {
        match f(&self) {
            Ok(value) => {
                self.commit()?;
                self.close()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(close_err) = self.close() {
                    warn!(error = %close_err, "rollback after failed scope reported errors");
                }
                Err(err)
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.owned || !self.manager.is_frame_open(self.id, self.depth) {
            return;
        }
        if let Err(err) = self.manager.close_frame(self.id, self.depth) {
            error!(id = %self.id, depth = self.depth, error = %err, "implicit close failed");
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("owned", &self.owned)
            .finish()
    }
}
