use thiserror::Error;

/// Result type alias using PetStoreError
pub type Result<T> = std::result::Result<T, PetStoreError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// in the pet store. Each kind maps to a stable error code that can be
/// used for programmatic error handling, testing, and CLI exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidInput,
    InvalidConfig,
    /// The operation does not apply to the record's current lifecycle state
    InvalidState,
    NotFound,
    ConstraintViolation,

    // Schema evolution
    /// Recorded schema history and the migration set (or the declared schema) disagree
    MigrationConflict,

    // Integration/IO
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::InvalidState => "ERR_INVALID_STATE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::MigrationConflict => "ERR_MIGRATION_CONFLICT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(source) = &self.source {
            write!(f, " <- {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for pet store operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PetStoreError {
    // ===== Record lifecycle =====
    /// No pet with this primary key is persisted
    #[error("Pet not found: {pet_id}")]
    PetNotFound { pet_id: i64 },

    /// A record that already carries an identity cannot be staged for insert
    #[error("Pet {pet_id} is already persisted and cannot be inserted again")]
    AlreadyPersisted { pet_id: i64 },

    /// A staged-insert ticket does not refer to a pending record
    #[error("No pending insert at staging slot {slot}")]
    UnknownStagedInsert { slot: usize },

    /// Column name that does not belong to the table
    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },

    /// Aggregate function name that is not supported
    #[error("Unknown aggregate function: {name}")]
    UnknownAggregate { name: String },

    // ===== Configuration =====
    /// Storage connection string could not be interpreted
    #[error("Invalid database url '{url}': {reason}")]
    InvalidDatabaseUrl { url: String, reason: String },

    /// Configuration value could not be interpreted
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // ===== Schema evolution =====
    /// A schema change that cannot be expressed as an automatic migration
    #[error("Unsupported schema change on {table}.{column}: {reason}")]
    UnsupportedSchemaChange {
        table: String,
        column: String,
        reason: String,
    },

    /// Recorded migration history disagrees with the known migration set
    #[error("Schema history conflict: {reason}")]
    SchemaHistoryConflict { reason: String },

    /// A migration script is malformed (bad id, missing half)
    #[error("Invalid migration {migration_id}: {reason}")]
    InvalidMigration {
        migration_id: String,
        reason: String,
    },

    // ===== Encoding =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Conversion from PetStoreError to ExError
impl From<PetStoreError> for ExError {
    fn from(err: PetStoreError) -> Self {
        let message = err.to_string();
        match err {
            PetStoreError::PetNotFound { pet_id } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(pet_id.to_string())
                .with_message(message),

            PetStoreError::AlreadyPersisted { pet_id } => ExError::new(ExErrorKind::InvalidState)
                .with_entity_id(pet_id.to_string())
                .with_message(message),

            PetStoreError::UnknownStagedInsert { .. } => {
                ExError::new(ExErrorKind::InvalidState).with_message(message)
            }

            PetStoreError::UnknownColumn { column } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity_id(column)
                .with_message(message),

            PetStoreError::UnknownAggregate { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }

            PetStoreError::InvalidDatabaseUrl { .. } | PetStoreError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::InvalidConfig).with_message(message)
            }

            PetStoreError::UnsupportedSchemaChange { table, .. } => {
                ExError::new(ExErrorKind::MigrationConflict)
                    .with_op("autogenerate")
                    .with_entity_id(table)
                    .with_message(message)
            }

            PetStoreError::SchemaHistoryConflict { .. } => {
                ExError::new(ExErrorKind::MigrationConflict).with_message(message)
            }

            PetStoreError::InvalidMigration { migration_id, .. } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_entity_id(migration_id)
                    .with_message(message)
            }

            PetStoreError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

/// Conversion from toml::de::Error to PetStoreError
impl From<toml::de::Error> for PetStoreError {
    fn from(err: toml::de::Error) -> Self {
        PetStoreError::Serialization {
            message: err.to_string(),
        }
    }
}
