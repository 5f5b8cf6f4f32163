//! Schema definition and schema diffing
//!
//! - `table`: declarative table/column metadata and DDL rendering
//! - `diff`: live-versus-declared comparison producing reversible operations

pub mod diff;
pub mod table;

pub use diff::{diff_schema, SchemaOp};
pub use table::{ColumnDef, ColumnType, Model, TableDef};
