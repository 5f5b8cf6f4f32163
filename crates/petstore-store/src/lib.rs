//! Pet Store Store - SQLite persistence for the pet record store
//!
//! Provides:
//! - The `Database` handle (connection, pragmas, optional auto-migration)
//! - Migrations framework: runner, directory sets, autogenerate
//! - `Session`, the unit of work with identity map and dirty tracking
//! - `Query`, the read facade over a session

pub mod db;
pub mod errors;
pub mod migrations;
pub mod query;
pub mod repo;
pub mod session;

// Re-export key types
pub use db::Database;
pub use errors::Result;
pub use query::Query;
pub use session::{
    CommitSummary, ModificationEvent, ModificationKind, RecordState, Session, StagedInsert,
};
