//! # flagstore Testkit
//!
//! Test utilities for flagstore.
//!
//! This crate provides:
//! - Fixtures: an in-memory table, store constructors, shared data sets
//! - Property-based test generators using proptest
//! - Golden rows in the table's JSON wire form
//! - Log capture for asserting on `tracing` output
//! - Concurrent upsert races
//!
//! ## Usage
//!
//! ```rust
//! use flagstore_testkit::prelude::*;
//!
//! let fixture = TestTable::new();
//! let store = fixture.store(&unique_prefix());
//! store.init(&good_data()).unwrap();
//! assert_eq!(all_data(&store), good_data());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod golden;
pub mod logs;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::golden::*;
    pub use crate::logs::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use golden::*;
pub use logs::*;
pub use stress::*;
