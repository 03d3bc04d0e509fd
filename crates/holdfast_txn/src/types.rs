//! Core type definitions for Holdfast transactions.

use std::fmt;

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing within one manager and
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Outcome of a closed transaction, as seen by its callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionResult {
    /// The transaction was committed before it closed.
    Committed,
    /// The transaction closed without a commit.
    Aborted,
}

impl TransactionResult {
    /// Returns `true` if the transaction was committed.
    #[must_use]
    pub const fn was_committed(self) -> bool {
        matches!(self, Self::Committed)
    }

    /// Returns `true` if the transaction was aborted.
    #[must_use]
    pub const fn was_aborted(self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed => f.write_str("committed"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Lifecycle of a [`crate::TransactionManager`].
///
/// Transitions are strictly nested:
/// `None -> Open -> Closing -> (OuterClosing when the root closes) -> None`,
/// or back to `Open` when a nested transaction finishes closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// No transaction is open.
    None,
    /// At least one transaction is open and none is closing.
    Open,
    /// A transaction's close callbacks are running.
    Closing,
    /// The root transaction's outer close callbacks are running.
    OuterClosing,
}

impl Lifecycle {
    /// Returns `true` while close or outer close callbacks are running.
    #[must_use]
    pub const fn is_closing(self) -> bool {
        matches!(self, Self::Closing | Self::OuterClosing)
    }
}
