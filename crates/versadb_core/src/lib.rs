//! # VersaDB Core
//!
//! Connection lifecycle and version-change negotiation engine for VersaDB.
//!
//! This crate provides:
//! - A [`Factory`] owning the database and connection registries
//! - Open requests that create, connect to, or upgrade a database
//! - Delete requests that wait for open connections to close
//! - Version-change transactions and "versionchange" broadcasts
//! - A deterministic cooperative [`Scheduler`] with a virtual clock
//!
//! ## Protocol
//!
//! Requests are returned synchronously and run on later scheduler turns.
//! Raising a database's version sends "versionchange" to every other open
//! connection and waits for all of them to close before the upgrade
//! transaction runs. If they are slow to close, the request reports
//! "blocked" once, after a configurable delay, and keeps waiting.
//!
//! ## Usage
//!
//! ```
//! use versadb_core::Factory;
//!
//! let factory = Factory::in_memory();
//! let request = factory.open_version("library", 2).unwrap();
//! request.on_upgrade_needed(|event| {
//!     event.connection.create_object_store("books").unwrap();
//! });
//! factory.scheduler().run_until_idle();
//!
//! let connection = request.result().unwrap();
//! assert_eq!(connection.version(), 2);
//! assert_eq!(connection.object_store_names(), vec!["books"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod args;
mod config;
mod connection;
mod coordinator;
mod delete;
mod error;
mod factory;
mod name;
mod open;
mod record;
mod registry;
mod request;
mod scheduler;
mod signal;
mod transaction;
mod types;

pub use args::OpenArgs;
pub use config::FactoryConfig;
pub use connection::Connection;
pub use error::{CoreError, CoreResult};
pub use factory::Factory;
pub use name::canonicalize;
pub use record::DatabaseRecord;
pub use request::{ReadyState, Request, RequestKind, SuccessEvent, UpgradeNeeded};
pub use scheduler::{Scheduler, Ticks, TimerHandle};
pub use signal::{Cardinality, Completion, ListenerId, Settlement, Signal};
pub use transaction::{TransactionState, VersionChangeTransaction};
pub use types::{ConnectionId, RequestId, VersionChange};

// Re-export the key model and storage interface used in the public API
pub use versadb_codec::{Key, Value};
pub use versadb_storage::{
    DatabaseOptions, InMemoryBackend, StorageBackend, StorageError, StoreDefinition,
    StoredDatabase,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
