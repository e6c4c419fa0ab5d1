//! # VersaDB Storage
//!
//! Storage backend trait and implementations for VersaDB.
//!
//! This crate is the storage collaborator of the engine. The engine never
//! touches records, indexes, or key encoding; it asks a backend to
//! construct-or-load a database, to persist a committed upgrade, and to
//! destroy a database when it is deleted.
//!
//! ## Design Principles
//!
//! - Backends are keyed by canonical database name
//! - A database is created at version 0 on first load
//! - Store definitions are only consulted at creation time
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//!
//! ## Example
//!
//! ```rust
//! use versadb_storage::{DatabaseOptions, InMemoryBackend, StorageBackend, StoredDatabase};
//!
//! let backend = InMemoryBackend::new();
//! backend.load("library", &DatabaseOptions::new()).unwrap();
//! let upgraded = StoredDatabase { version: 1, store_names: vec!["books".into()] };
//! backend.commit_upgrade("library", &upgraded).unwrap();
//! assert_eq!(backend.snapshot("library"), Some(upgraded));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod schema;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
pub use schema::{DatabaseOptions, StoreDefinition, StoredDatabase};
