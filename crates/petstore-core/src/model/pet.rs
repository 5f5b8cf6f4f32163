use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::value::Value;
use crate::errors::PetStoreError;
use crate::schema::{ColumnDef, Model, TableDef};

/// Maximum length of a pet's name, enforced by storage
pub const NAME_MAX_LEN: u32 = 50;

/// Primary key of a persisted pet
///
/// Only ever produced by storage; there is no way to assign one to a
/// transient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PetId(i64);

impl PetId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PetId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Pet - the single record kind of the store
///
/// A pet constructed with [`Pet::new`] is *transient*: it has no identity
/// until a session commits its insert. The identity is read-only; `name`
/// and `species` can be mutated freely and are picked up as dirty changes
/// at the next commit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Pet {
    id: Option<PetId>,

    /// Display name (at most 50 characters once stored)
    pub name: Option<String>,

    /// Free-form species
    pub species: Option<String>,
}

impl Pet {
    /// Create a transient pet with both fields set
    pub fn new(name: impl Into<String>, species: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            species: Some(species.into()),
        }
    }

    /// Rebuild a persisted pet from a stored row
    pub fn persisted(id: PetId, name: Option<String>, species: Option<String>) -> Self {
        Self {
            id: Some(id),
            name,
            species,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_species(mut self, species: Option<String>) -> Self {
        self.species = species;
        self
    }

    /// Primary key, `None` while transient
    pub fn id(&self) -> Option<PetId> {
        self.id
    }

    /// Check if this pet has never been committed
    pub fn is_transient(&self) -> bool {
        self.id.is_none()
    }

    /// Value of one column
    pub fn value_of(&self, column: PetColumn) -> Value {
        match column {
            PetColumn::Id => self.id.map(|id| id.get()).into(),
            PetColumn::Name => self.name.clone().into(),
            PetColumn::Species => self.species.clone().into(),
        }
    }

    /// Mutable columns whose value differs from `snapshot`
    pub fn changed_columns(&self, snapshot: &Pet) -> Vec<PetColumn> {
        PetColumn::MUTABLE
            .iter()
            .copied()
            .filter(|c| self.value_of(*c) != snapshot.value_of(*c))
            .collect()
    }
}

impl fmt::Display for Pet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "transient".to_string());
        write!(
            f,
            "<Pet {} name={} species={}>",
            id,
            self.name.as_deref().unwrap_or("NULL"),
            self.species.as_deref().unwrap_or("NULL")
        )
    }
}

impl Model for Pet {
    const TABLE: &'static str = "pet";

    fn table_def() -> TableDef {
        TableDef::new(
            Self::TABLE,
            vec![
                ColumnDef::integer("id").primary_key(),
                ColumnDef::string("name", NAME_MAX_LEN),
                ColumnDef::text("species"),
            ],
        )
    }
}

/// Typed reference to a column of the `pet` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetColumn {
    Id,
    Name,
    Species,
}

impl PetColumn {
    pub const ALL: [PetColumn; 3] = [PetColumn::Id, PetColumn::Name, PetColumn::Species];

    /// Columns a caller may change after insert
    pub const MUTABLE: [PetColumn; 2] = [PetColumn::Name, PetColumn::Species];

    pub fn name(&self) -> &'static str {
        match self {
            PetColumn::Id => "id",
            PetColumn::Name => "name",
            PetColumn::Species => "species",
        }
    }
}

impl fmt::Display for PetColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PetColumn {
    type Err = PetStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PetColumn::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| PetStoreError::UnknownColumn {
                column: s.to_string(),
            })
    }
}
