//! Schema diff engine
//!
//! Compares the live schema (as introspected from storage) with the declared
//! table definitions and produces an ordered list of reversible operations.
//! Only changes SQLite can apply in place are supported; everything else is
//! reported as `UnsupportedSchemaChange` and needs a hand-written migration.

use crate::errors::{PetStoreError, Result};
use crate::schema::table::{create_index_sql, drop_index_sql, ColumnDef, TableDef};

/// One reversible schema operation
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOp {
    CreateTable(TableDef),
    DropTable(TableDef),
    AddColumn { table: String, column: ColumnDef },
    DropColumn { table: String, column: ColumnDef },
    CreateIndex { table: String, column: String, unique: bool },
    DropIndex { table: String, column: String, unique: bool },
}

impl SchemaOp {
    /// SQL statement applying this operation
    pub fn sql(&self) -> String {
        match self {
            SchemaOp::CreateTable(table) => table.create_sql(),
            SchemaOp::DropTable(table) => table.drop_sql(),
            SchemaOp::AddColumn { table, column } => {
                format!("ALTER TABLE {} ADD COLUMN {}", table, column.column_sql())
            }
            SchemaOp::DropColumn { table, column } => {
                format!("ALTER TABLE {} DROP COLUMN {}", table, column.name)
            }
            SchemaOp::CreateIndex {
                table,
                column,
                unique,
            } => create_index_sql(table, column, *unique),
            SchemaOp::DropIndex { table, column, .. } => drop_index_sql(table, column),
        }
    }

    /// The operation undoing this one
    pub fn reverse(&self) -> SchemaOp {
        match self {
            SchemaOp::CreateTable(t) => SchemaOp::DropTable(t.clone()),
            SchemaOp::DropTable(t) => SchemaOp::CreateTable(t.clone()),
            SchemaOp::AddColumn { table, column } => SchemaOp::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            SchemaOp::DropColumn { table, column } => SchemaOp::AddColumn {
                table: table.clone(),
                column: column.clone(),
            },
            SchemaOp::CreateIndex {
                table,
                column,
                unique,
            } => SchemaOp::DropIndex {
                table: table.clone(),
                column: column.clone(),
                unique: *unique,
            },
            SchemaOp::DropIndex {
                table,
                column,
                unique,
            } => SchemaOp::CreateIndex {
                table: table.clone(),
                column: column.clone(),
                unique: *unique,
            },
        }
    }

    /// Short human summary, used for migration headers and CLI output
    pub fn describe(&self) -> String {
        match self {
            SchemaOp::CreateTable(t) => format!("create table {}", t.name),
            SchemaOp::DropTable(t) => format!("drop table {}", t.name),
            SchemaOp::AddColumn { table, column } => {
                format!("add column {}.{}", table, column.name)
            }
            SchemaOp::DropColumn { table, column } => {
                format!("drop column {}.{}", table, column.name)
            }
            SchemaOp::CreateIndex { table, column, .. } => {
                format!("create index on {}.{}", table, column)
            }
            SchemaOp::DropIndex { table, column, .. } => {
                format!("drop index on {}.{}", table, column)
            }
        }
    }
}

/// Upgrade statements for a list of operations, in order
pub fn upgrade_sql(ops: &[SchemaOp]) -> Vec<String> {
    ops.iter().map(SchemaOp::sql).collect()
}

/// Downgrade statements: reversed operations in reverse order
pub fn downgrade_sql(ops: &[SchemaOp]) -> Vec<String> {
    ops.iter().rev().map(|op| op.reverse().sql()).collect()
}

/// Diff the live schema against the declared tables
///
/// Declared tables are visited in declaration order, then live tables that
/// are no longer declared in name order, so the output is deterministic.
///
/// # Errors
///
/// Returns `UnsupportedSchemaChange` when a column changes type, nullability,
/// primary key, inline uniqueness or default, or when a column would have to
/// be added or dropped in a way SQLite's `ALTER TABLE` cannot express.
pub fn diff_schema(live: &[TableDef], declared: &[TableDef]) -> Result<Vec<SchemaOp>> {
    let mut ops = Vec::new();

    for table in declared {
        match live.iter().find(|t| t.name == table.name) {
            None => {
                ops.push(SchemaOp::CreateTable(table.clone()));
                for column in table.columns.iter().filter(|c| c.index) {
                    ops.push(SchemaOp::CreateIndex {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        unique: column.unique,
                    });
                }
            }
            Some(existing) => diff_table(existing, table, &mut ops)?,
        }
    }

    let mut dropped: Vec<&TableDef> = live
        .iter()
        .filter(|t| !declared.iter().any(|d| d.name == t.name))
        .collect();
    dropped.sort_by(|a, b| a.name.cmp(&b.name));
    for table in dropped {
        for column in table.columns.iter().filter(|c| c.index) {
            ops.push(SchemaOp::DropIndex {
                table: table.name.clone(),
                column: column.name.clone(),
                unique: column.unique,
            });
        }
        ops.push(SchemaOp::DropTable(table.clone()));
    }

    Ok(ops)
}

fn diff_table(live: &TableDef, declared: &TableDef, ops: &mut Vec<SchemaOp>) -> Result<()> {
    let table = declared.name.clone();

    for column in &declared.columns {
        match live.column(&column.name) {
            None => {
                check_addable(&table, column)?;
                ops.push(SchemaOp::AddColumn {
                    table: table.clone(),
                    column: column.clone(),
                });
                if column.index {
                    ops.push(SchemaOp::CreateIndex {
                        table: table.clone(),
                        column: column.name.clone(),
                        unique: column.unique,
                    });
                }
            }
            Some(existing) => diff_column(&table, existing, column, ops)?,
        }
    }

    for column in &live.columns {
        if declared.column(&column.name).is_some() {
            continue;
        }
        check_droppable(&table, column)?;
        // Re-adding on downgrade has the same limits as adding on upgrade
        check_addable(&table, column)?;
        if column.index {
            ops.push(SchemaOp::DropIndex {
                table: table.clone(),
                column: column.name.clone(),
                unique: column.unique,
            });
        }
        ops.push(SchemaOp::DropColumn {
            table: table.clone(),
            column: column.clone(),
        });
    }

    Ok(())
}

fn diff_column(
    table: &str,
    live: &ColumnDef,
    declared: &ColumnDef,
    ops: &mut Vec<SchemaOp>,
) -> Result<()> {
    let unsupported = |reason: String| PetStoreError::UnsupportedSchemaChange {
        table: table.to_string(),
        column: declared.name.clone(),
        reason,
    };

    if live.ty != declared.ty {
        return Err(unsupported(format!(
            "type changes from {} to {}",
            live.ty.sql_type(),
            declared.ty.sql_type()
        )));
    }
    if live.primary_key != declared.primary_key {
        return Err(unsupported("primary key membership changes".to_string()));
    }
    if live.nullable != declared.nullable {
        return Err(unsupported("nullability changes".to_string()));
    }
    if live.has_inline_unique() != declared.has_inline_unique() {
        return Err(unsupported("inline UNIQUE constraint changes".to_string()));
    }
    if live.default != declared.default {
        return Err(unsupported("default value changes".to_string()));
    }

    if live.index && (!declared.index || live.unique != declared.unique) {
        ops.push(SchemaOp::DropIndex {
            table: table.to_string(),
            column: live.name.clone(),
            unique: live.unique,
        });
    }
    if declared.index && (!live.index || live.unique != declared.unique) {
        ops.push(SchemaOp::CreateIndex {
            table: table.to_string(),
            column: declared.name.clone(),
            unique: declared.unique,
        });
    }
    Ok(())
}

fn check_addable(table: &str, column: &ColumnDef) -> Result<()> {
    let reason = if column.primary_key {
        Some("cannot add a PRIMARY KEY column to an existing table")
    } else if column.has_inline_unique() {
        Some("cannot add a column with an inline UNIQUE constraint")
    } else if !column.nullable && column.default.as_ref().map_or(true, |d| d.is_null()) {
        Some("cannot add a NOT NULL column without a non-null default")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(PetStoreError::UnsupportedSchemaChange {
            table: table.to_string(),
            column: column.name.clone(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn check_droppable(table: &str, column: &ColumnDef) -> Result<()> {
    let reason = if column.primary_key {
        Some("cannot drop a PRIMARY KEY column")
    } else if column.has_inline_unique() {
        Some("cannot drop a column with an inline UNIQUE constraint")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(PetStoreError::UnsupportedSchemaChange {
            table: table.to_string(),
            column: column.name.clone(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
