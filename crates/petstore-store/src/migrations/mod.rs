//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums and history validation
//! - Upgrade and downgrade to any known revision
//! - Embedded SQL migrations and directory-based migration sets
//! - Autogeneration of the next migration from declared tables

mod autogenerate;
mod checksums;
mod embedded;
mod introspect;
mod runner;

pub use autogenerate::{autogenerate, MigrationScript};
pub use checksums::compute_checksum;
pub use embedded::{embedded_migrations, load_dir, Migration};
pub use introspect::{live_table, live_tables};
pub use runner::{
    applied_migrations, apply_migrations, current_revision, downgrade, history, upgrade,
    AppliedMigration, HistoryEntry,
};
