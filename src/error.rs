//! Error types for the seed batch and configuration.
//!
//! Errors are classified by how the batch reacts to them:
//! - Configuration: bad dataset or config file, detected before any write
//! - Fatal: store failures and missing identifiers, the whole batch rolls back
//!
//! Unresolved vocabulary references are not errors; they are downgraded to
//! `SeedWarning`s by the seed runner.

use std::path::PathBuf;
use thiserror::Error;

use crate::db::DbError;

/// Errors raised by the seed batch.
#[derive(Debug, Error)]
pub enum SeedError {
    // Configuration errors
    #[error("Failed to read dataset {path}: {source}")]
    DatasetRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse dataset: {0}")]
    DatasetParse(#[from] serde_json::Error),

    #[error("School '{name}' has no natural key (miur_code)")]
    MissingNaturalKey { name: String },

    #[error("Natural key {0} appears more than once in the dataset")]
    DuplicateNaturalKey(String),

    #[error("Parent school references form a cycle through {0}")]
    ParentCycle(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Fatal errors
    #[error("Failed to get a valid id for school {name} ({code})")]
    MissingParentId { name: String, code: String },

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl SeedError {
    /// Returns true if the error was detected before the batch touched the store.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SeedError::DatasetRead { .. }
                | SeedError::DatasetParse(_)
                | SeedError::MissingNaturalKey { .. }
                | SeedError::DuplicateNaturalKey(_)
                | SeedError::ParentCycle(_)
                | SeedError::Config(_)
        )
    }
}

impl From<rusqlite::Error> for SeedError {
    fn from(err: rusqlite::Error) -> Self {
        SeedError::Db(DbError::Sqlite(err))
    }
}

/// Errors raised while loading `config.json`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        let err = SeedError::MissingNaturalKey {
            name: "Liceo".to_string(),
        };
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Liceo"));

        let fatal = SeedError::MissingParentId {
            name: "Liceo".to_string(),
            code: "TN000".to_string(),
        };
        assert!(!fatal.is_configuration());
    }

    #[test]
    fn test_sqlite_error_wraps_into_db_variant() {
        let err: SeedError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, SeedError::Db(DbError::Sqlite(_))));
    }
}
