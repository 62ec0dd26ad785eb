//! MongoDB administration commands for curator
//!
//! This crate runs predefined, independent mutation commands against a
//! document store and logs each outcome.
//!
//! # Features
//! - `DocumentStore` seam with a driver-backed and an in-memory implementation
//! - Declarative index specifications (uniqueness, collation, partial filters)
//! - Insert-many, update-many and delete-one commands
//! - A runner that logs every result and never lets one failure stop another
//! - Create-if-missing and drop-all index maintenance
//! - The catalog of named scripts

pub mod command;
pub mod connection;
pub mod filter;
pub mod index;
pub mod maintenance;
pub mod memory;
pub mod mongo_store;
pub mod runner;
pub mod scripts;
pub mod store;
pub mod validation;

pub use command::{Command, CommandOutcome, Operation};
pub use connection::{Connection, ConnectionConfig, DEFAULT_DATABASE};
pub use curator_common::{CuratorError, Result};
pub use index::{CollationSpec, IndexSpec};
pub use maintenance::{drop_all_indexes, ensure_index, ensure_indexes, DropSummary, EnsureAction};
pub use memory::{CallKind, MemoryStore, RecordedCall};
pub use mongo_store::MongoStore;
pub use runner::{CommandFailure, CommandReport, CommandRunner, RunSummary};
pub use scripts::{Script, ScriptEntry, CATALOG};
pub use store::{DeleteOutcome, DocumentStore, InsertManyOutcome, UpdateOutcome};
pub use validation::ValidatedCollectionName;
