//! Where migration definitions come from.
//!
//! Every source reduces to "produce the set of migrations it knows about".
//! Ordering is the planner's job, not the source's.

mod directory;
mod embedded;

pub use directory::DirectorySource;
pub use embedded::EmbeddedSource;

use crate::migration::Migration;
use crate::sqlparse::ParseError;
use async_trait::async_trait;
use thiserror::Error;

/// File extension of migration scripts.
pub const SCRIPT_EXTENSION: &str = ".sql";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to list migrations: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Failed to parse migration {name}: {source}")]
    ParseError { name: String, source: ParseError },
}

/// Produces migration definitions.
#[async_trait]
pub trait MigrationSource: Send + Sync {
    async fn find_migrations(&self) -> Result<Vec<Migration>, SourceError>;
}

/// A hardcoded, in-memory set of migrations.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    migrations: Vec<Migration>,
}

impl MemorySource {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }
}

#[async_trait]
impl MigrationSource for MemorySource {
    async fn find_migrations(&self) -> Result<Vec<Migration>, SourceError> {
        Ok(self.migrations.clone())
    }
}

/// Parse one script, tagging failures with its name.
pub(crate) fn parse_script(name: &str, raw: &str) -> Result<Migration, SourceError> {
    Migration::parse(name, raw).map_err(|source| SourceError::ParseError {
        name: name.to_string(),
        source,
    })
}
