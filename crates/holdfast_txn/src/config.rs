//! Transaction manager configuration.

/// Configuration for a [`crate::TransactionManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Deepest nesting level a transaction may be opened at.
    ///
    /// The root is depth 0, so `max_depth = 2` allows a root plus two
    /// nested levels.
    pub max_depth: usize,

    /// Whether panics raised by close callbacks are captured and reported
    /// as [`crate::TransferError::CallbackFailed`].
    ///
    /// When `false` the first panic is resumed after every callback has run
    /// and the manager state is consistent again.
    pub capture_panics: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            capture_panics: true,
        }
    }
}

impl ManagerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets whether callback panics are captured.
    #[must_use]
    pub const fn capture_panics(mut self, value: bool) -> Self {
        self.capture_panics = value;
        self
    }
}
