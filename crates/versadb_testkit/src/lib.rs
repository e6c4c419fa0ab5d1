//! # VersaDB Testkit
//!
//! Test utilities for VersaDB.
//!
//! This crate provides:
//! - Test fixtures: an in-memory factory and instrumented backends
//! - Recorders for request and connection notifications
//! - Property-based test generators using proptest
//! - Key-order test vectors
//! - A protocol harness for cross-crate scenarios
//!
//! ## Usage
//!
//! ```rust
//! use versadb_testkit::prelude::*;
//!
//! let tf = TestFactory::new();
//! let request = tf.open("db", 2);
//! let log = RequestLog::attach(&request, tf.scheduler());
//! tf.settle();
//! assert_eq!(log.outcome(), Some(RequestEvent::Success(Some(0), Some(2))));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod recorder;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::recorder::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use recorder::*;
pub use vectors::*;
