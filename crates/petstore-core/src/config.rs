//! Store configuration
//!
//! Two values matter: where the database lives and whether per-record
//! change tracking is emitted. They come from an optional TOML file and are
//! overridden by `PETSTORE_*` environment variables (a `.env` file is read
//! first).
//!
//! ```toml
//! database_url = "sqlite:///pets.db"
//! track_modifications = false
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::errors::{PetStoreError, Result};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "petstore.toml";

pub const ENV_DATABASE_URL: &str = "PETSTORE_DATABASE_URL";
pub const ENV_TRACK_MODIFICATIONS: &str = "PETSTORE_TRACK_MODIFICATIONS";
pub const ENV_AUTO_MIGRATE: &str = "PETSTORE_AUTO_MIGRATE";

/// Process configuration for the store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Storage connection string, e.g. `sqlite:///pets.db`
    pub database_url: String,

    /// Emit one event per modified record on commit
    pub track_modifications: bool,

    /// Upgrade to the latest embedded migration when the database is opened
    pub auto_migrate: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:///petstore.db".to_string(),
            track_modifications: false,
            auto_migrate: false,
        }
    }
}

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    InMemory,
    File(PathBuf),
}

impl StoreConfig {
    /// Configuration pointing at a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }

    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns `Serialization` on malformed TOML or unknown keys.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, `petstore.toml` in the
    /// working directory is used when present, defaults otherwise. Environment
    /// overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the file cannot be read or an override is
    /// malformed, `Serialization` when the file is not valid TOML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is normal
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| PetStoreError::InvalidConfig {
                reason: format!("cannot read {}: {}", path.display(), e),
            })?;
        Self::from_toml_str(&contents)
    }

    /// Apply `PETSTORE_*` overrides using `lookup` as the environment
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a boolean override that is not a recognised
    /// truthy/falsy word.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(flag) = lookup(ENV_TRACK_MODIFICATIONS) {
            self.track_modifications = parse_flag(ENV_TRACK_MODIFICATIONS, &flag)?;
        }
        if let Some(flag) = lookup(ENV_AUTO_MIGRATE) {
            self.auto_migrate = parse_flag(ENV_AUTO_MIGRATE, &flag)?;
        }
        Ok(())
    }

    /// Resolve `database_url` to a storage target
    ///
    /// # Errors
    ///
    /// Returns `InvalidDatabaseUrl` for non-SQLite schemes or an empty path.
    pub fn target(&self) -> Result<DatabaseTarget> {
        parse_database_url(&self.database_url)
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PetStoreError::InvalidConfig {
            reason: format!("{} must be a boolean, got '{}'", key, other),
        }),
    }
}

/// Interpret a storage connection string
///
/// Accepted forms: `sqlite:///path` (path relative to the working directory,
/// or absolute as `sqlite:////abs/path`), `sqlite://` and `sqlite::memory:`
/// for an in-memory database, and a bare filesystem path.
///
/// # Errors
///
/// Returns `InvalidDatabaseUrl` for other schemes or an empty location.
pub fn parse_database_url(url: &str) -> Result<DatabaseTarget> {
    let invalid = |reason: &str| PetStoreError::InvalidDatabaseUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty url"));
    }
    if trimmed == "sqlite://" || trimmed == "sqlite::memory:" || trimmed == ":memory:" {
        return Ok(DatabaseTarget::InMemory);
    }
    if let Some(path) = trimmed.strip_prefix("sqlite:///") {
        if path.is_empty() {
            return Err(invalid("missing database path"));
        }
        if path == ":memory:" {
            return Ok(DatabaseTarget::InMemory);
        }
        return Ok(DatabaseTarget::File(PathBuf::from(path)));
    }
    if trimmed.contains("://") {
        return Err(invalid("only sqlite urls are supported"));
    }
    Ok(DatabaseTarget::File(PathBuf::from(trimmed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(!config.track_modifications);
        assert_eq!(
            config.target().unwrap(),
            DatabaseTarget::File(PathBuf::from("petstore.db"))
        );
    }

    #[test]
    fn test_url_forms() {
        assert_eq!(
            parse_database_url("sqlite://").unwrap(),
            DatabaseTarget::InMemory
        );
        assert_eq!(
            parse_database_url("sqlite::memory:").unwrap(),
            DatabaseTarget::InMemory
        );
        assert_eq!(
            parse_database_url("sqlite:////var/lib/pets.db").unwrap(),
            DatabaseTarget::File(PathBuf::from("/var/lib/pets.db"))
        );
        assert_eq!(
            parse_database_url("data/pets.db").unwrap(),
            DatabaseTarget::File(PathBuf::from("data/pets.db"))
        );
        assert!(parse_database_url("postgres://localhost/pets").is_err());
        assert!(parse_database_url("sqlite:///").is_err());
        assert!(parse_database_url("  ").is_err());
    }

    #[test]
    fn test_toml_parsing() {
        let config = StoreConfig::from_toml_str(
            "database_url = \"sqlite:///pets.db\"\ntrack_modifications = true\n",
        )
        .unwrap();
        assert_eq!(config.database_url, "sqlite:///pets.db");
        assert!(config.track_modifications);
        assert!(!config.auto_migrate);

        let err = StoreConfig::from_toml_str("colour = \"blue\"").unwrap_err();
        assert!(matches!(err, PetStoreError::Serialization { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATABASE_URL, "sqlite://"),
            (ENV_TRACK_MODIFICATIONS, "yes"),
        ]
        .into_iter()
        .collect();
        let mut config = StoreConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.target().unwrap(), DatabaseTarget::InMemory);
        assert!(config.track_modifications);

        let err = config
            .apply_env_overrides(|k| (k == ENV_AUTO_MIGRATE).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, PetStoreError::InvalidConfig { .. }));
    }
}
