//! Transaction manager.

use crate::config::ManagerConfig;
use crate::error::{CallbackError, CallbackResult, TransferError, TransferResult};
use crate::transaction::state::{CloseCallback, ManagerState, OuterCloseCallback};
use crate::transaction::Transaction;
use crate::types::{Lifecycle, TransactionId, TransactionResult};
use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread;
use tracing::{debug, trace, warn};

thread_local! {
    static THREAD_MANAGER: TransactionManager = TransactionManager::new();
}

/// Owns the stack of open transactions for one thread of execution.
///
/// The manager provides:
/// - Exactly one current (innermost) transaction at a time
/// - Nested transactions that commit into their parent
/// - Close callbacks per transaction and outer close callbacks per tree
/// - Total invocation of callbacks, even when some of them fail
///
/// ## Thread Affinity
///
/// A manager is a cheap, clonable handle around shared state and is
/// neither `Send` nor `Sync`. Create one per worker, or use
/// [`TransactionManager::for_current_thread`] for an implicit per-thread
/// instance. Storages bound to a manager must only be used from its thread.
#[derive(Clone)]
pub struct TransactionManager {
    shared: Rc<Shared>,
}

struct Shared {
    config: ManagerConfig,
    state: RefCell<ManagerState>,
}

/// Failures collected while running one batch of callbacks.
#[derive(Default)]
struct CallbackFailures {
    errors: Vec<CallbackError>,
    /// First panic payload, kept only when panics are not captured.
    panic: Option<Box<dyn Any + Send>>,
}

impl CallbackFailures {
    fn finish(self) -> TransferResult<()> {
        if let Some(payload) = self.panic {
            if !thread::panicking() {
                panic::resume_unwind(payload);
            }
        }
        match TransferError::from_callback_failures(self.errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    /// Creates a manager with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Creates a manager with the given configuration.
    #[must_use]
    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            shared: Rc::new(Shared {
                config,
                state: RefCell::new(ManagerState::new()),
            }),
        }
    }

    /// Returns the manager owned by the calling thread.
    ///
    /// Every call on the same thread returns a handle to the same manager.
    #[must_use]
    pub fn for_current_thread() -> Self {
        THREAD_MANAGER.with(Clone::clone)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.borrow().lifecycle
    }

    /// Returns `true` if any transaction is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.shared.state.borrow().stack.is_empty()
    }

    /// Returns the depth of the innermost open transaction.
    #[must_use]
    pub fn depth(&self) -> Option<usize> {
        self.shared.state.borrow().stack.len().checked_sub(1)
    }

    /// Returns `true` if both handles refer to the same manager.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Opens a root transaction.
    ///
    /// # Errors
    ///
    /// - [`TransferError::AlreadyOpen`] if a transaction is already open
    /// - [`TransferError::ClosingInProgress`] if called from a close callback
    pub fn open_outer(&self) -> TransferResult<Transaction<'static>> {
        let mut state = self.shared.state.borrow_mut();
        match state.lifecycle {
            Lifecycle::None => {}
            Lifecycle::Open => {
                return Err(TransferError::AlreadyOpen {
                    depth: state.stack.len().saturating_sub(1),
                })
            }
            lifecycle => {
                return Err(TransferError::closing_in_progress(
                    "open an outer transaction",
                    lifecycle,
                ))
            }
        }

        let (id, depth) = state.push_frame();
        debug!(%id, "opened outer transaction");
        Ok(Transaction::owned(self.clone(), id, depth))
    }

    /// Returns the innermost open transaction, if any.
    ///
    /// The returned handle does not close the transaction when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ClosingInProgress`] while close callbacks
    /// run: the closing transaction is no longer current.
    pub fn current(&self) -> TransferResult<Option<Transaction<'static>>> {
        let lifecycle = self.lifecycle();
        if lifecycle.is_closing() {
            return Err(TransferError::closing_in_progress(
                "query the current transaction",
                lifecycle,
            ));
        }
        Ok(self.current_unchecked())
    }

    /// Returns the innermost open transaction, or `None` when nothing is
    /// open or a close is in progress.
    #[must_use]
    pub fn current_unchecked(&self) -> Option<Transaction<'static>> {
        let state = self.shared.state.borrow();
        if state.lifecycle != Lifecycle::Open {
            return None;
        }
        let depth = state.stack.len().checked_sub(1)?;
        let id = state.stack[depth].id;
        Some(Transaction::borrowed(self.clone(), id, depth))
    }

    /// Returns a non-closing handle to the open transaction at `depth`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::NoTransactionAtDepth`] if nothing is open
    /// at that depth.
    pub fn open_transaction(&self, depth: usize) -> TransferResult<Transaction<'static>> {
        let state = self.shared.state.borrow();
        match state.stack.get(depth) {
            Some(frame) => Ok(Transaction::borrowed(self.clone(), frame.id, depth)),
            None => Err(TransferError::NoTransactionAtDepth { depth }),
        }
    }

    /// Opens a transaction for a speculative step.
    ///
    /// - With `Some(tx)`, opens a child of `tx`.
    /// - With `None`, opens a child of the current transaction if one is
    ///   open, or a new root otherwise.
    ///
    /// Closing the result without committing undoes everything done in it.
    pub fn open_speculative<'a>(
        &'a self,
        tx: Option<&'a Transaction<'_>>,
    ) -> TransferResult<Transaction<'a>> {
        match tx {
            Some(tx) => {
                if !tx.manager().ptr_eq(self) {
                    return Err(TransferError::ForeignTransaction { id: tx.id() });
                }
                tx.open_nested()
            }
            None => match self.current()? {
                Some(current) => self.open_nested_from(current.id(), current.depth()),
                None => self.open_outer(),
            },
        }
    }

    /// Runs `f` in a new root transaction.
    ///
    /// The transaction is committed if `f` returns `Ok` and rolled back
    /// otherwise. It is always closed before this returns.
    pub fn run_outer<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<TransferError>,
    {
        self.open_outer()?.run_scoped(f)
    }

    pub(crate) fn open_nested_from<'a>(
        &self,
        parent: TransactionId,
        parent_depth: usize,
    ) -> TransferResult<Transaction<'a>> {
        let mut state = self.shared.state.borrow_mut();
        if state.lifecycle.is_closing() {
            return Err(TransferError::closing_in_progress(
                "open a nested transaction",
                state.lifecycle,
            ));
        }
        state.ensure_current(parent, parent_depth)?;

        let max_depth = self.shared.config.max_depth;
        if parent_depth + 1 > max_depth {
            return Err(TransferError::DepthLimitExceeded { max_depth });
        }

        let (id, depth) = state.push_frame();
        trace!(%id, %parent, depth, "opened nested transaction");
        Ok(Transaction::owned(self.clone(), id, depth))
    }

    pub(crate) fn is_frame_open(&self, id: TransactionId, depth: usize) -> bool {
        self.shared.state.borrow().is_open(id, depth)
    }

    pub(crate) fn is_frame_current(&self, id: TransactionId, depth: usize) -> bool {
        self.shared.state.borrow().ensure_current(id, depth).is_ok()
    }

    pub(crate) fn ensure_frame_current(&self, id: TransactionId, depth: usize) -> TransferResult<()> {
        let state = self.shared.state.borrow();
        if state.lifecycle.is_closing() {
            return Err(TransferError::closing_in_progress(
                "use a transaction",
                state.lifecycle,
            ));
        }
        state.ensure_current(id, depth)
    }

    pub(crate) fn is_frame_committed(&self, id: TransactionId, depth: usize) -> bool {
        let state = self.shared.state.borrow();
        state
            .stack
            .get(depth)
            .is_some_and(|frame| frame.id == id && frame.committed)
    }

    pub(crate) fn commit_frame(&self, id: TransactionId, depth: usize) -> TransferResult<()> {
        let mut state = self.shared.state.borrow_mut();
        if state.lifecycle.is_closing() {
            return Err(TransferError::closing_in_progress(
                "commit a transaction",
                state.lifecycle,
            ));
        }
        state.ensure_current(id, depth)?;

        let frame = state.frame_mut(id, depth)?;
        if frame.committed {
            return Err(TransferError::AlreadyCommitted { id });
        }
        frame.committed = true;
        Ok(())
    }

    pub(crate) fn add_close_callback(
        &self,
        id: TransactionId,
        depth: usize,
        callback: CloseCallback,
    ) -> TransferResult<()> {
        let mut state = self.shared.state.borrow_mut();
        if state.lifecycle == Lifecycle::OuterClosing {
            return Err(TransferError::closing_in_progress(
                "register a close callback",
                state.lifecycle,
            ));
        }
        state.frame_mut(id, depth)?.close_callbacks.push(callback);
        Ok(())
    }

    pub(crate) fn add_outer_close_callback(
        &self,
        id: TransactionId,
        depth: usize,
        callback: OuterCloseCallback,
    ) -> TransferResult<()> {
        let mut state = self.shared.state.borrow_mut();
        if state.lifecycle == Lifecycle::OuterClosing {
            return Err(TransferError::closing_in_progress(
                "register an outer close callback",
                state.lifecycle,
            ));
        }
        // The closing transaction may still defer work to the root's close.
        if !state.is_open(id, depth) && state.closing != Some(id) {
            return Err(TransferError::Closed { id });
        }
        state.outer_callbacks.push(callback);
        Ok(())
    }

    /// Closes the innermost transaction.
    ///
    /// 1. Validates that `id` is current and pops it.
    /// 2. Runs its close callbacks in registration order (`Closing`).
    /// 3. For the root, runs the outer close callbacks (`OuterClosing`).
    /// 4. Restores `Open` (nested) or `None` (root).
    ///
    /// Every callback runs even when earlier ones fail; failures are
    /// reported after the stack is consistent again.
    pub(crate) fn close_frame(
        &self,
        id: TransactionId,
        depth: usize,
    ) -> TransferResult<TransactionResult> {
        let frame = {
            let mut state = self.shared.state.borrow_mut();
            if state.lifecycle.is_closing() {
                return Err(TransferError::closing_in_progress(
                    "close a transaction",
                    state.lifecycle,
                ));
            }
            state.ensure_current(id, depth)?;
            let Some(frame) = state.stack.pop() else {
                return Err(TransferError::Closed { id });
            };
            state.lifecycle = Lifecycle::Closing;
            state.closing = Some(id);
            frame
        };

        let result = if frame.committed {
            TransactionResult::Committed
        } else {
            TransactionResult::Aborted
        };
        debug!(
            %id,
            depth,
            %result,
            callbacks = frame.close_callbacks.len(),
            "closing transaction"
        );

        let mut failures = CallbackFailures::default();
        let closing = Transaction::borrowed(self.clone(), id, depth);
        for callback in frame.close_callbacks {
            self.invoke(&mut failures, || callback(&closing, result));
        }

        if depth == 0 {
            let outer = {
                let mut state = self.shared.state.borrow_mut();
                state.lifecycle = Lifecycle::OuterClosing;
                std::mem::take(&mut state.outer_callbacks)
            };
            trace!(%id, callbacks = outer.len(), "running outer close callbacks");
            for callback in outer {
                self.invoke(&mut failures, || callback(result));
            }
        }

        {
            let mut state = self.shared.state.borrow_mut();
            state.closing = None;
            state.lifecycle = if state.stack.is_empty() {
                Lifecycle::None
            } else {
                Lifecycle::Open
            };
        }

        failures.finish()?;
        Ok(result)
    }

    fn invoke(&self, failures: &mut CallbackFailures, callback: impl FnOnce() -> CallbackResult) {
        match panic::catch_unwind(AssertUnwindSafe(callback)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "close callback failed");
                failures.errors.push(err);
            }
            Err(payload) => {
                let err = CallbackError::from_panic(payload.as_ref());
                warn!(error = %err, "close callback panicked");
                failures.errors.push(err);
                if !self.shared.config.capture_panics && failures.panic.is_none() {
                    failures.panic = Some(payload);
                }
            }
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("TransactionManager")
            .field("lifecycle", &state.lifecycle)
            .field("depth", &state.stack.len().checked_sub(1))
            .field("outer_callbacks", &state.outer_callbacks.len())
            .finish_non_exhaustive()
    }
}
