//! Declarative table and column definitions
//!
//! A `TableDef` is pure metadata: it renders DDL for migrations and is
//! compared against the live database when autogenerating a migration.
//! Nothing here touches storage or enforces constraints itself.

use serde::{Deserialize, Serialize};

use crate::model::Value;

/// Semantic column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    /// Bounded text; `max_len` renders as `VARCHAR(n)` plus a length CHECK
    String { max_len: Option<u32> },
    /// Unbounded text
    Text,
    Boolean,
}

impl ColumnType {
    /// Declared SQL type name
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::String { max_len: Some(n) } => format!("VARCHAR({})", n),
            ColumnType::String { max_len: None } => "VARCHAR".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
        }
    }

    /// Parse a declared SQL type as reported by `PRAGMA table_info`
    pub fn from_sql_type(declared: &str) -> Option<Self> {
        let upper = declared.trim().to_ascii_uppercase();
        match upper.as_str() {
            "INTEGER" | "INT" | "BIGINT" => Some(ColumnType::Integer),
            "TEXT" => Some(ColumnType::Text),
            "BOOLEAN" => Some(ColumnType::Boolean),
            "VARCHAR" => Some(ColumnType::String { max_len: None }),
            _ => {
                let inner = upper.strip_prefix("VARCHAR(")?.strip_suffix(')')?;
                inner
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .map(|n| ColumnType::String { max_len: Some(n) })
            }
        }
    }
}

/// One column of a table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub primary_key: bool,
    pub nullable: bool,
    pub unique: bool,
    pub index: bool,
    pub default: Option<Value>,
}

impl ColumnDef {
    fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            primary_key: false,
            nullable: true,
            unique: false,
            index: false,
            default: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn string(name: impl Into<String>, max_len: u32) -> Self {
        Self::new(
            name,
            ColumnType::String {
                max_len: Some(max_len),
            },
        )
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    /// Mark as primary key (implies NOT NULL)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Whether uniqueness is carried by an inline `UNIQUE` constraint
    /// rather than by a unique index.
    pub fn has_inline_unique(&self) -> bool {
        self.unique && !self.index
    }

    /// Column definition as it appears inside `CREATE TABLE` / `ADD COLUMN`
    pub fn column_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.ty.sql_type());
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.has_inline_unique() {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql_literal());
        }
        match self.ty {
            ColumnType::String { max_len: Some(n) } => {
                sql.push_str(&format!(" CHECK (length({}) <= {})", self.name, n));
            }
            ColumnType::Boolean => {
                sql.push_str(&format!(" CHECK ({} IN (0, 1))", self.name));
            }
            _ => {}
        }
        sql
    }
}

/// A table definition: name plus ordered columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// `CREATE TABLE` statement (indexes are separate, see `index_sql`)
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDef::column_sql).collect();
        let pk: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect();
        if !pk.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }
        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.name,
            parts.join(",\n    ")
        )
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE {}", self.name)
    }

    /// `CREATE INDEX` statements for every indexed column
    pub fn index_sql(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.index)
            .map(|c| create_index_sql(&self.name, &c.name, c.unique))
            .collect()
    }
}

/// Conventional index name for a single-column index
pub fn index_name(table: &str, column: &str) -> String {
    format!("ix_{}_{}", table, column)
}

pub fn create_index_sql(table: &str, column: &str, unique: bool) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if unique { "UNIQUE " } else { "" },
        index_name(table, column),
        table,
        column
    )
}

pub fn drop_index_sql(table: &str, column: &str) -> String {
    format!("DROP INDEX {}", index_name(table, column))
}

/// Something with a declared table
pub trait Model {
    /// Table name
    const TABLE: &'static str;

    /// Full declared definition of the table
    fn table_def() -> TableDef;
}
