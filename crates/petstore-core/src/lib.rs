//! Pet Store Core - domain model and storage-independent machinery
//!
//! This crate provides the foundational pieces of the pet record store:
//! - The `Pet` record, its typed columns and its declared table
//! - Declarative schema definitions and the schema diff engine
//! - Composable predicates and query descriptions
//! - The error facility (`ExError`, `PetStoreError`)
//! - The structured logging facility
//! - Store configuration
//!
//! Storage itself (SQLite, sessions, migrations) lives in `petstore-store`.

pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod query;
pub mod schema;

// Used by the logging macros
pub use petstore_core_types;

// Re-export commonly used types
pub use config::{DatabaseTarget, StoreConfig};
pub use errors::{ExError, ExErrorKind, PetStoreError, Result};
pub use model::{Pet, PetColumn, PetId, Value};
pub use query::{Aggregate, Predicate, QuerySpec};
pub use schema::{ColumnDef, Model, TableDef};
