//! Snapshot participants.
//!
//! A participant wraps a piece of state that takes part in transactions.
//! The first mutation at a given depth stores a snapshot of the state and
//! registers one close callback on that transaction:
//!
//! - **Abort**: the snapshot is restored by value
//! - **Commit, nested**: the snapshot moves to the parent, unless the parent
//!   already holds an older one
//! - **Commit, root**: the snapshot is dropped and the final commit
//!   listeners are scheduled as an outer close callback

use crate::error::{CallbackError, CallbackResult, TransferError, TransferResult};
use crate::transaction::{Transaction, TransactionManager};
use crate::types::{TransactionId, TransactionResult};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Listener invoked after the root transaction commits.
type FinalCommitListener<S> = Box<dyn Fn(&S)>;

/// State that can be rolled back by the transaction it was changed in.
///
/// Cloning the handle shares the underlying state.
pub struct SnapshotParticipant<S: Clone + 'static> {
    inner: Rc<ParticipantInner<S>>,
}

struct Enlistment<S> {
    id: TransactionId,
    snapshot: S,
}

struct ParticipantInner<S> {
    manager: TransactionManager,
    state: RefCell<S>,
    /// Pre-transaction snapshots, indexed by transaction depth.
    snapshots: RefCell<Vec<Option<Enlistment<S>>>>,
    listeners: RefCell<Vec<FinalCommitListener<S>>>,
}

impl<S: Clone + 'static> Clone for SnapshotParticipant<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: Clone + 'static> SnapshotParticipant<S> {
    /// Creates a participant bound to `manager` with an initial state.
    pub fn new(manager: &TransactionManager, initial: S) -> Self {
        Self {
            inner: Rc::new(ParticipantInner {
                manager: manager.clone(),
                state: RefCell::new(initial),
                snapshots: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Returns the manager this participant is bound to.
    #[must_use]
    pub fn manager(&self) -> &TransactionManager {
        &self.inner.manager
    }

    /// Returns a copy of the current state.
    ///
    /// The state includes uncommitted changes of open transactions.
    #[must_use]
    pub fn get(&self) -> S {
        self.inner.state.borrow().clone()
    }

    /// Reads the current state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Enlists in `tx`, storing a snapshot on the first call per transaction.
    ///
    /// # Errors
    ///
    /// - [`TransferError::ForeignTransaction`] if `tx` belongs to another manager
    /// - [`TransferError::NotCurrent`] / [`TransferError::Closed`] unless `tx`
    ///   is the innermost open transaction
    pub fn enlist(&self, tx: &Transaction<'_>) -> TransferResult<()> {
        if !tx.manager().ptr_eq(&self.inner.manager) {
            return Err(TransferError::ForeignTransaction { id: tx.id() });
        }
        tx.ensure_current()?;

        let depth = tx.depth();
        {
            let mut snapshots = self.inner.snapshots.borrow_mut();
            if snapshots.len() <= depth {
                snapshots.resize_with(depth + 1, || None);
            }
            if matches!(&snapshots[depth], Some(entry) if entry.id == tx.id()) {
                return Ok(());
            }
            snapshots[depth] = Some(Enlistment {
                id: tx.id(),
                snapshot: self.inner.state.borrow().clone(),
            });
        }

        let inner = Rc::clone(&self.inner);
        let registered = tx.add_close_callback(move |closing, result| {
            ParticipantInner::on_close(&inner, closing, result)
        });
        if let Err(err) = registered {
            self.inner.snapshots.borrow_mut()[depth] = None;
            return Err(err);
        }
        trace!(id = %tx.id(), depth, "participant enlisted");
        Ok(())
    }

    /// Enlists in `tx` and applies `f` to the state.
    pub fn update<R>(
        &self,
        tx: &Transaction<'_>,
        f: impl FnOnce(&mut S) -> R,
    ) -> TransferResult<R> {
        self.enlist(tx)?;
        Ok(f(&mut self.inner.state.borrow_mut()))
    }

    /// Enlists in `tx` and replaces the state.
    pub fn set(&self, tx: &Transaction<'_>, value: S) -> TransferResult<()> {
        self.update(tx, |state| *state = value)
    }

    /// Returns `true` if a snapshot is held for `tx`.
    #[must_use]
    pub fn is_enlisted(&self, tx: &Transaction<'_>) -> bool {
        let snapshots = self.inner.snapshots.borrow();
        matches!(snapshots.get(tx.depth()), Some(Some(entry)) if entry.id == tx.id())
    }

    /// Registers a listener run once per committed root transaction that
    /// changed this participant.
    ///
    /// Listeners see the final state. They run during the root's outer close
    /// and must not register further listeners.
    pub fn on_final_commit(&self, listener: impl Fn(&S) + 'static) {
        self.inner.listeners.borrow_mut().push(Box::new(listener));
    }
}

impl<S: Clone + 'static> ParticipantInner<S> {
    fn on_close(
        this: &Rc<Self>,
        tx: &Transaction<'_>,
        result: TransactionResult,
    ) -> CallbackResult {
        let depth = tx.depth();
        let taken = this
            .snapshots
            .borrow_mut()
            .get_mut(depth)
            .and_then(Option::take);
        let Some(Enlistment { snapshot, .. }) = taken else {
            return Err(CallbackError::new(format!(
                "participant has no snapshot for {} at depth {depth}",
                tx.id()
            )));
        };

        if result.was_aborted() {
            *this.state.borrow_mut() = snapshot;
            trace!(id = %tx.id(), depth, "participant rolled back");
            return Ok(());
        }

        if tx.is_root() {
            let participant = Rc::clone(this);
            tx.add_outer_close_callback(move |result| {
                if result.was_committed() {
                    participant.final_commit();
                }
                Ok(())
            })?;
            return Ok(());
        }

        let Some(parent) = tx.parent() else {
            return Err(CallbackError::new(format!(
                "parent of {} at depth {depth} is not open",
                tx.id()
            )));
        };

        let parent_depth = parent.depth();
        let handed_over = {
            let mut snapshots = this.snapshots.borrow_mut();
            let slot = &mut snapshots[parent_depth];
            if matches!(slot, Some(entry) if entry.id == parent.id()) {
                // The parent's snapshot is older and wins.
                false
            } else {
                *slot = Some(Enlistment {
                    id: parent.id(),
                    snapshot,
                });
                true
            }
        };

        if handed_over {
            let participant = Rc::clone(this);
            parent.add_close_callback(move |closing, result| {
                ParticipantInner::on_close(&participant, closing, result)
            })?;
            trace!(from = %tx.id(), to = %parent.id(), "snapshot handed to parent");
        }
        Ok(())
    }

    fn final_commit(&self) {
        let state = self.state.borrow();
        for listener in self.listeners.borrow().iter() {
            listener(&state);
        }
    }
}

impl<S: Clone + fmt::Debug + 'static> fmt::Debug for SnapshotParticipant<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enlisted = self
            .inner
            .snapshots
            .borrow()
            .iter()
            .filter(|entry| entry.is_some())
            .count();
        f.debug_struct("SnapshotParticipant")
            .field("state", &*self.inner.state.borrow())
            .field("enlisted", &enlisted)
            .finish_non_exhaustive()
    }
}
