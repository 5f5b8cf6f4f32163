//! Migration scripts
//!
//! The built-in set is embedded at compile time using include_str!. The same
//! `NNN_slug.up.sql` / `NNN_slug.down.sql` layout can be loaded from a
//! directory at runtime.

use petstore_core::errors::PetStoreError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{io_error, Result};

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

/// One versioned, reversible schema change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// `NNN_slug`; ordering is by the numeric prefix
    pub id: String,
    pub upgrade: String,
    pub downgrade: String,
}

impl Migration {
    pub fn new(
        id: impl Into<String>,
        upgrade: impl Into<String>,
        downgrade: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            upgrade: upgrade.into(),
            downgrade: downgrade.into(),
        }
    }

    /// Numeric prefix of the id
    ///
    /// # Errors
    ///
    /// Returns `InvalidMigration` when the id is not of the form `NNN_slug`.
    pub fn number(&self) -> Result<u32> {
        parse_number(&self.id)
    }

    /// Write both halves into `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns `Io` when the directory or files cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir).map_err(|e| io_error("migration_write", e))?;
        let up = dir.join(format!("{}{}", self.id, UP_SUFFIX));
        let down = dir.join(format!("{}{}", self.id, DOWN_SUFFIX));
        std::fs::write(&up, &self.upgrade).map_err(|e| io_error("migration_write", e))?;
        std::fs::write(&down, &self.downgrade).map_err(|e| io_error("migration_write", e))?;
        Ok((up, down))
    }
}

fn parse_number(id: &str) -> Result<u32> {
    let invalid = |reason: &str| PetStoreError::InvalidMigration {
        migration_id: id.to_string(),
        reason: reason.to_string(),
    };
    let (prefix, slug) = id
        .split_once('_')
        .ok_or_else(|| invalid("expected NNN_slug"))?;
    if slug.is_empty() || prefix.len() < 3 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected NNN_slug").into());
    }
    prefix
        .parse::<u32>()
        .map_err(|_| invalid("revision number out of range").into())
}

/// Get all embedded migrations in order
pub fn embedded_migrations() -> Vec<Migration> {
    vec![Migration::new(
        "001_create_pet",
        include_str!("../../migrations/001_create_pet.up.sql"),
        include_str!("../../migrations/001_create_pet.down.sql"),
    )]
}

/// Load migrations from a directory
///
/// Files not ending in `.up.sql` / `.down.sql` are ignored. The result is
/// ordered by revision number.
///
/// # Errors
///
/// Returns `InvalidMigration` for a malformed id, a missing half, or two
/// migrations sharing a revision number, and `Io` when the directory cannot
/// be read.
pub fn load_dir(dir: &Path) -> Result<Vec<Migration>> {
    let mut halves: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();

    let entries = std::fs::read_dir(dir).map_err(|e| io_error("migration_load", e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_error("migration_load", e))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();

        let (id, is_up) = if let Some(id) = file_name.strip_suffix(UP_SUFFIX) {
            (id.to_string(), true)
        } else if let Some(id) = file_name.strip_suffix(DOWN_SUFFIX) {
            (id.to_string(), false)
        } else {
            continue;
        };

        let sql = std::fs::read_to_string(entry.path())
            .map_err(|e| io_error("migration_load", e))?;
        let slot = halves.entry(id).or_default();
        if is_up {
            slot.0 = Some(sql);
        } else {
            slot.1 = Some(sql);
        }
    }

    let mut migrations = Vec::with_capacity(halves.len());
    for (id, (upgrade, downgrade)) in halves {
        let missing = |half: &str| PetStoreError::InvalidMigration {
            migration_id: id.clone(),
            reason: format!("missing {} script", half),
        };
        let upgrade = upgrade.ok_or_else(|| missing("upgrade"))?;
        let downgrade = downgrade.ok_or_else(|| missing("downgrade"))?;
        let migration = Migration::new(id.clone(), upgrade, downgrade);
        let number = migration.number()?;
        migrations.push((number, migration));
    }

    migrations.sort_by_key(|(number, _)| *number);
    for pair in migrations.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(PetStoreError::InvalidMigration {
                migration_id: pair[1].1.id.clone(),
                reason: format!("revision number shared with {}", pair[0].1.id),
            }
            .into());
        }
    }

    Ok(migrations.into_iter().map(|(_, m)| m).collect())
}
