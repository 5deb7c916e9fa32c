pub mod audit;
pub mod client;
pub mod schema;
pub mod seed;
pub mod sqlite;

pub use client::*;
pub use schema::*;
pub use sqlite::*;

use thiserror::Error;

/// Structured classification of data-client failures.
///
/// Callers branch on the kind, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    AlreadyExists,
    MissingTable,
    NotFound,
    /// Primary-key or unique clash: the row is already there.
    Duplicate,
    /// Any other constraint, e.g. a missing foreign-key parent.
    Constraint,
    InvalidData,
    Other,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Table {table} already exists")]
    AlreadyExists { table: String },

    #[error("Table {table} does not exist")]
    MissingTable { table: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Connection lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    pub fn kind(&self) -> DbErrorKind {
        match self {
            Self::AlreadyExists { .. } => DbErrorKind::AlreadyExists,
            Self::MissingTable { .. } => DbErrorKind::MissingTable,
            Self::NotFound { .. } => DbErrorKind::NotFound,
            Self::DuplicateKey(_) => DbErrorKind::Duplicate,
            Self::ConstraintViolation(_) => DbErrorKind::Constraint,
            Self::InvalidEnum { .. } | Self::InvalidRow(_) | Self::Serialization(_) => {
                DbErrorKind::InvalidData
            }
            Self::Sqlite(_) | Self::LockPoisoned => DbErrorKind::Other,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == DbErrorKind::AlreadyExists
    }

    pub fn is_missing_table(&self) -> bool {
        self.kind() == DbErrorKind::MissingTable
    }
}

/// The SQLite adapter is the only place raw driver messages are inspected.
impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let message = message.clone().unwrap_or_default();
                if let Some(table) = message.strip_prefix("no such table: ") {
                    return Self::MissingTable {
                        table: table.trim().to_string(),
                    };
                }
                if let Some(rest) = message.strip_prefix("table ") {
                    if let Some(table) = rest.strip_suffix(" already exists") {
                        return Self::AlreadyExists {
                            table: table.trim_matches('"').to_string(),
                        };
                    }
                }
                if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                    return match failure.extended_code {
                        rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => Self::DuplicateKey(message),
                        _ => Self::ConstraintViolation(message),
                    };
                }
                Self::Sqlite(err)
            }
            _ => Self::Sqlite(err),
        }
    }
}
