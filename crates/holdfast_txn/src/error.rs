//! Error types for Holdfast transactions.

use crate::types::{Lifecycle, TransactionId};
use std::any::Any;
use thiserror::Error;

/// Result type for transaction and storage operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Result type returned by close and outer close callbacks.
pub type CallbackResult = Result<(), CallbackError>;

/// A failure reported by (or captured from) a close callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
    panicked: bool,
}

impl CallbackError {
    /// Creates a callback error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panicked: false,
        }
    }

    /// Creates a callback error from a captured panic payload.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "callback panicked".to_string()
        };
        Self {
            message,
            panicked: true,
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if the callback panicked rather than returning an error.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        self.panicked
    }
}

impl From<TransferError> for CallbackError {
    fn from(err: TransferError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors raised by the transaction protocol.
///
/// Rejected transfers (wrong variant, full storage) are not errors; they
/// show up as a smaller returned amount. Every variant here is a protocol
/// violation or a callback failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// `open_outer` was called while a transaction is already open.
    #[error("a transaction is already open (innermost depth {depth}); open a nested one instead")]
    AlreadyOpen {
        /// Depth of the innermost open transaction.
        depth: usize,
    },

    /// The transaction is open but is not the innermost one.
    #[error("transaction {id} is not the current transaction")]
    NotCurrent {
        /// The transaction that was used.
        id: TransactionId,
        /// The innermost open transaction, if any.
        current: Option<TransactionId>,
    },

    /// The transaction has already been closed.
    #[error("transaction {id} is closed")]
    Closed {
        /// The closed transaction.
        id: TransactionId,
    },

    /// `commit` was called twice.
    #[error("transaction {id} was already committed")]
    AlreadyCommitted {
        /// The transaction.
        id: TransactionId,
    },

    /// The operation is not allowed while callbacks are running.
    #[error("cannot {operation} while the manager is {lifecycle:?}")]
    ClosingInProgress {
        /// What was attempted.
        operation: &'static str,
        /// The lifecycle state at the time.
        lifecycle: Lifecycle,
    },

    /// Opening another nested transaction would exceed the configured depth.
    #[error("nesting depth limit of {max_depth} exceeded")]
    DepthLimitExceeded {
        /// The configured limit.
        max_depth: usize,
    },

    /// No transaction is open at the requested depth.
    #[error("no transaction is open at depth {depth}")]
    NoTransactionAtDepth {
        /// The requested depth.
        depth: usize,
    },

    /// The transaction belongs to another manager than the participant.
    #[error("transaction {id} belongs to a different transaction manager")]
    ForeignTransaction {
        /// The foreign transaction.
        id: TransactionId,
    },

    /// One or more close callbacks failed. Every callback still ran.
    #[error("close callback failed: {first} ({} more suppressed)", .suppressed.len())]
    CallbackFailed {
        /// The first failure, in invocation order.
        first: CallbackError,
        /// Later failures.
        suppressed: Vec<CallbackError>,
    },
}

impl TransferError {
    /// Creates a closing-in-progress error.
    pub fn closing_in_progress(operation: &'static str, lifecycle: Lifecycle) -> Self {
        Self::ClosingInProgress {
            operation,
            lifecycle,
        }
    }

    /// Builds a callback failure from collected errors.
    ///
    /// Returns `None` when nothing failed.
    pub fn from_callback_failures(mut failures: Vec<CallbackError>) -> Option<Self> {
        if failures.is_empty() {
            return None;
        }
        let first = failures.remove(0);
        Some(Self::CallbackFailed {
            first,
            suppressed: failures,
        })
    }

    /// Returns `true` for errors caused by misuse of the transaction API.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Self::CallbackFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_error_from_str_panic() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let err = CallbackError::from_panic(payload.as_ref());
        assert_eq!(err.message(), "boom");
        assert!(err.is_panic());
    }

    #[test]
    fn callback_error_from_string_panic() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("formatted boom"));
        let err = CallbackError::from_panic(payload.as_ref());
        assert_eq!(err.message(), "formatted boom");
    }

    #[test]
    fn callback_error_from_opaque_panic() {
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        let err = CallbackError::from_panic(payload.as_ref());
        assert_eq!(err.message(), "callback panicked");
    }

    #[test]
    fn no_failures_builds_nothing() {
        assert!(TransferError::from_callback_failures(Vec::new()).is_none());
    }

    #[test]
    fn failures_keep_order() {
        let err = TransferError::from_callback_failures(vec![
            CallbackError::new("first"),
            CallbackError::new("second"),
            CallbackError::new("third"),
        ])
        .unwrap();

        match &err {
            TransferError::CallbackFailed { first, suppressed } => {
                assert_eq!(first.message(), "first");
                assert_eq!(suppressed.len(), 2);
                assert_eq!(suppressed[1].message(), "third");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "close callback failed: first (2 more suppressed)"
        );
        assert!(!err.is_protocol_violation());
    }

    #[test]
    fn protocol_violation_message() {
        let err = TransferError::NotCurrent {
            id: TransactionId::new(3),
            current: Some(TransactionId::new(4)),
        };
        assert!(err.is_protocol_violation());
        assert_eq!(err.to_string(), "transaction txn:3 is not the current transaction");
    }
}
