use super::{parse_script, MigrationSource, SourceError, SCRIPT_EXTENSION};
use crate::migration::Migration;
use async_trait::async_trait;

/// Migrations compiled into the binary as `(path, contents)` pairs.
///
/// ```ignore
/// static MIGRATIONS: &[(&str, &str)] = &[
///     ("migrations/001_people.sql", include_str!("../migrations/001_people.sql")),
/// ];
/// let source = EmbeddedSource::new(MIGRATIONS);
/// ```
///
/// The id is the final path component. Entries not ending in `.sql` are skipped.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSource {
    files: &'static [(&'static str, &'static str)],
}

impl EmbeddedSource {
    pub const fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self { files }
    }
}

#[async_trait]
impl MigrationSource for EmbeddedSource {
    async fn find_migrations(&self) -> Result<Vec<Migration>, SourceError> {
        self.files
            .iter()
            .filter(|(path, _)| path.ends_with(SCRIPT_EXTENSION))
            .map(|&(path, content)| {
                let name = path.rsplit('/').next().unwrap_or(path);
                parse_script(name, content)
            })
            .collect()
    }
}
