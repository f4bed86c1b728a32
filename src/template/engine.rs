use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::utils::{generate_migration_id, migration_file_name, now_iso, slugify};

/// Skeleton written by `sqlshift new`
/// Placeholders: {{id}}, {{name}}, {{created_at}}
const MIGRATION_TEMPLATE: &str = "\
-- {{name}}
-- Created: {{created_at}}

-- +migrate Up

-- +migrate Down
";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Render error: {0}")]
    RenderError(#[from] handlebars::RenderError),

    #[error("Migration name is required")]
    NameRequired,

    #[error("Migration file already exists: {0}")]
    AlreadyExists(PathBuf),
}

/// Context for the migration template
#[derive(Debug, Clone, Serialize)]
pub struct MigrationTemplateContext {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    template: String,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::with_template(MIGRATION_TEMPLATE)
    }

    /// Use a custom migration skeleton instead of the built-in one
    pub fn with_template(template: impl Into<String>) -> Self {
        let mut handlebars = Handlebars::new();
        // SQL, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self {
            handlebars,
            template: template.into(),
        }
    }

    /// Render a migration skeleton
    pub fn render_migration(
        &self,
        context: &MigrationTemplateContext,
    ) -> Result<String, TemplateError> {
        self.handlebars
            .render_template(&self.template, context)
            .map_err(TemplateError::from)
    }

    /// Write a new, empty migration script into `dir` and return its path
    pub async fn create_migration(&self, dir: &Path, name: &str) -> Result<PathBuf, TemplateError> {
        if slugify(name).is_empty() {
            return Err(TemplateError::NameRequired);
        }

        let id = generate_migration_id();
        let path = dir.join(migration_file_name(&id, name));
        if path.exists() {
            return Err(TemplateError::AlreadyExists(path));
        }

        let content = self.render_migration(&MigrationTemplateContext {
            id,
            name: name.trim().to_string(),
            created_at: now_iso(),
        })?;

        fs::create_dir_all(dir).await?;
        fs::write(&path, content).await?;
        Ok(path)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlparse::split_statements;

    fn context() -> MigrationTemplateContext {
        MigrationTemplateContext {
            id: "20240115143052".to_string(),
            name: "create <people>".to_string(),
            created_at: "2024-01-15T14:30:52+00:00".to_string(),
        }
    }

    #[test]
    fn test_render_default_template() {
        let engine = TemplateEngine::new();
        let rendered = engine.render_migration(&context()).unwrap();

        assert!(rendered.starts_with("-- create <people>\n"));
        assert!(rendered.contains("-- +migrate Up"));
        assert!(rendered.contains("-- +migrate Down"));

        // A fresh skeleton is a valid, empty migration
        let split = split_statements(&rendered).unwrap();
        assert!(split.up.is_empty());
        assert!(split.down.is_empty());
    }

    #[test]
    fn test_custom_template() {
        let engine = TemplateEngine::with_template("-- {{id}}\n-- +migrate Up\n");
        assert_eq!(
            engine.render_migration(&context()).unwrap(),
            "-- 20240115143052\n-- +migrate Up\n"
        );
    }

    #[test]
    fn test_invalid_template() {
        let engine = TemplateEngine::with_template("{{#if}}");
        let result = engine.render_migration(&context());
        assert!(matches!(result, Err(TemplateError::RenderError(_))));
    }

    #[tokio::test]
    async fn test_create_migration_writes_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("migrations");
        let engine = TemplateEngine::new();

        let path = engine.create_migration(&dir, "Add People").await.unwrap();

        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.ends_with("-add-people.sql"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("-- Add People\n"));
    }

    #[tokio::test]
    async fn test_create_migration_requires_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = TemplateEngine::new();

        let result = engine.create_migration(temp_dir.path(), " !! ").await;
        assert!(matches!(result, Err(TemplateError::NameRequired)));
    }
}
