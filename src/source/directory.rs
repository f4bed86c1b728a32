use super::{parse_script, MigrationSource, SourceError, SCRIPT_EXTENSION};
use crate::migration::Migration;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Migrations loaded from `*.sql` files directly inside a directory.
///
/// The file name is the migration id. Subdirectories are not searched.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl MigrationSource for DirectorySource {
    async fn find_migrations(&self) -> Result<Vec<Migration>, SourceError> {
        // Surface a missing directory as a plain IO error
        fs::metadata(&self.dir).await?;

        let mut migrations = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(SCRIPT_EXTENSION) {
                continue;
            }

            let content = fs::read_to_string(entry.path()).await?;
            migrations.push(parse_script(&name, &content)?);
        }

        debug!(
            dir = %self.dir.display(),
            count = migrations.len(),
            "Loaded migrations from directory"
        );
        Ok(migrations)
    }
}
