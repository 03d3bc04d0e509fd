//! # Holdfast Testkit
//!
//! Test utilities for Holdfast.
//!
//! This crate provides:
//! - Fixtures: a manager with storage constructors and tracing setup
//! - Property-based generators for storage layouts and nested step trees
//! - Scripted scenarios with a runner that checks rollback as it goes
//! - JSON scenario vectors with their expected outcomes
//! - Soak runs over long sequences of generated transactions
//!
//! ## Usage
//!
//! ```rust
//! use holdfast_testkit::prelude::*;
//!
//! for vector in all_vectors() {
//!     vector.run().unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scenario;
pub mod soak;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scenario::*;
    pub use crate::soak::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scenario::*;
pub use soak::*;
pub use vectors::*;
