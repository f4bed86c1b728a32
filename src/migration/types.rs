//! Types for the migration system.

use crate::datastore::DatastoreError;
use crate::source::SourceError;
use crate::sqlparse::{split_statements, ParseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error types for migration operations.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Failed to connect: {0}")]
    Connect(#[source] DatastoreError),

    #[error("Ledger access failed: {0}")]
    LedgerAccess(#[source] DatastoreError),

    #[error("Failed to begin transaction for migration {id}: {source}")]
    TransactionBegin { id: String, source: DatastoreError },

    #[error("Migration {id} failed at statement {index}: {source}")]
    StatementExecution {
        id: String,
        index: usize,
        source: DatastoreError,
    },

    #[error("Failed to update ledger for migration {id}: {source}")]
    LedgerUpdate { id: String, source: DatastoreError },

    #[error("Failed to commit migration {id}: {source}")]
    Commit { id: String, source: DatastoreError },

    #[error("Duplicate migration id: {0}")]
    DuplicateId(String),
}

/// Failure of an apply run, with the number of migrations committed before it.
#[derive(Error, Debug)]
#[error("{error} ({applied} migration(s) applied before the failure)")]
pub struct ApplyError {
    pub applied: usize,
    #[source]
    pub error: MigrationError,
}

impl From<MigrationError> for ApplyError {
    fn from(error: MigrationError) -> Self {
        Self { applied: 0, error }
    }
}

/// Direction of migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Apply pending migrations, oldest first.
    Up,
    /// Revert applied migrations, newest first.
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => f.write_str("up"),
            MigrationDirection::Down => f.write_str("down"),
        }
    }
}

/// A single migration definition.
///
/// Ids must sort lexicographically in chronological order, e.g. a
/// zero-padded sequence or timestamp prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub id: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl Migration {
    pub fn new(id: impl Into<String>, up: Vec<String>, down: Vec<String>) -> Self {
        Self {
            id: id.into(),
            up,
            down,
        }
    }

    /// Build a migration from annotated script text.
    pub fn parse(id: impl Into<String>, raw: &str) -> Result<Self, ParseError> {
        let split = split_statements(raw)?;
        Ok(Self::new(id, split.up, split.down))
    }

    /// The statements to run in the given direction.
    pub fn statements(&self, direction: MigrationDirection) -> &[String] {
        match direction {
            MigrationDirection::Up => &self.up,
            MigrationDirection::Down => &self.down,
        }
    }
}

/// A migration selected for this run, with its statements resolved.
#[derive(Debug, Clone)]
pub struct PlannedMigration {
    pub migration: Arc<Migration>,
    pub queries: Vec<String>,
}

impl PlannedMigration {
    pub fn new(migration: Arc<Migration>, direction: MigrationDirection) -> Self {
        let queries = migration.statements(direction).to_vec();
        Self { migration, queries }
    }

    pub fn id(&self) -> &str {
        &self.migration.id
    }
}

/// A row in the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

/// Status of one migration as reported by `Migrator::status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub id: String,
    /// When it was applied; `None` if pending.
    pub applied_at: Option<DateTime<Utc>>,
    /// False for ledger entries whose definition is no longer in the source.
    pub in_source: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_migration() {
        let migration = Migration::parse(
            "001_people.sql",
            "-- +migrate Up\nCREATE TABLE people (id INT);\n-- +migrate Down\nDROP TABLE people;\n",
        )
        .unwrap();
        assert_eq!(migration.id, "001_people.sql");
        assert_eq!(migration.up, vec!["CREATE TABLE people (id INT);"]);
        assert_eq!(migration.down, vec!["DROP TABLE people;"]);
    }

    #[test]
    fn test_planned_migration_resolves_queries() {
        let migration = Arc::new(Migration::new(
            "001",
            vec!["CREATE TABLE t (x INT)".to_string()],
            vec!["DROP TABLE t".to_string()],
        ));

        let up = PlannedMigration::new(Arc::clone(&migration), MigrationDirection::Up);
        assert_eq!(up.queries, vec!["CREATE TABLE t (x INT)"]);

        let down = PlannedMigration::new(migration, MigrationDirection::Down);
        assert_eq!(down.queries, vec!["DROP TABLE t"]);
        assert_eq!(down.id(), "001");
    }

    #[test]
    fn test_apply_error_from_migration_error() {
        let error: ApplyError = MigrationError::DuplicateId("001".to_string()).into();
        assert_eq!(error.applied, 0);
        assert!(error.to_string().contains("Duplicate migration id: 001"));
    }
}
