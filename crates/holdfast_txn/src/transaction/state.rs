//! Stack state shared by a manager and its transaction handles.

use crate::error::{CallbackResult, TransferError, TransferResult};
use crate::transaction::Transaction;
use crate::types::{Lifecycle, TransactionId, TransactionResult};

/// Callback run when the transaction it was registered on closes.
pub(crate) type CloseCallback = Box<dyn FnOnce(&Transaction<'_>, TransactionResult) -> CallbackResult>;

/// Callback run once, when the root transaction closes.
pub(crate) type OuterCloseCallback = Box<dyn FnOnce(TransactionResult) -> CallbackResult>;

/// One open transaction on the stack.
pub(crate) struct Frame {
    pub(crate) id: TransactionId,
    pub(crate) committed: bool,
    pub(crate) close_callbacks: Vec<CloseCallback>,
}

impl Frame {
    fn new(id: TransactionId) -> Self {
        Self {
            id,
            committed: false,
            close_callbacks: Vec::new(),
        }
    }
}

/// Mutable state of a manager.
///
/// Only mutated by open, commit, close and callback registration, each of
/// which validates before touching the stack.
pub(crate) struct ManagerState {
    /// Open transactions, root first. Index == depth.
    pub(crate) stack: Vec<Frame>,
    /// Outer close callbacks of the whole tree, in registration order.
    pub(crate) outer_callbacks: Vec<OuterCloseCallback>,
    pub(crate) lifecycle: Lifecycle,
    /// Transaction whose close callbacks are running.
    pub(crate) closing: Option<TransactionId>,
    next_id: u64,
}

impl ManagerState {
    pub(crate) fn new() -> Self {
        Self {
            stack: Vec::new(),
            outer_callbacks: Vec::new(),
            lifecycle: Lifecycle::None,
            closing: None,
            next_id: 1,
        }
    }

    /// Pushes a new frame and returns its ID and depth.
    pub(crate) fn push_frame(&mut self) -> (TransactionId, usize) {
        let id = TransactionId::new(self.next_id);
        self.next_id += 1;
        self.stack.push(Frame::new(id));
        self.lifecycle = Lifecycle::Open;
        (id, self.stack.len() - 1)
    }

    pub(crate) fn current_id(&self) -> Option<TransactionId> {
        self.stack.last().map(|frame| frame.id)
    }

    pub(crate) fn is_open(&self, id: TransactionId, depth: usize) -> bool {
        self.stack.get(depth).is_some_and(|frame| frame.id == id)
    }

    pub(crate) fn ensure_open(&self, id: TransactionId, depth: usize) -> TransferResult<()> {
        if self.is_open(id, depth) {
            Ok(())
        } else {
            Err(TransferError::Closed { id })
        }
    }

    pub(crate) fn ensure_current(&self, id: TransactionId, depth: usize) -> TransferResult<()> {
        self.ensure_open(id, depth)?;
        if depth + 1 == self.stack.len() {
            Ok(())
        } else {
            Err(TransferError::NotCurrent {
                id,
                current: self.current_id(),
            })
        }
    }

    pub(crate) fn frame_mut(&mut self, id: TransactionId, depth: usize) -> TransferResult<&mut Frame> {
        match self.stack.get_mut(depth) {
            Some(frame) if frame.id == id => Ok(frame),
            _ => Err(TransferError::Closed { id }),
        }
    }
}
