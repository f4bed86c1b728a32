pub mod config;
pub mod datastore;
pub mod migration;
pub mod source;
pub mod sqlparse;
pub mod template;
pub mod utils;

// Re-export commonly used types
pub use config::{read_config, ConfigError, Environment, SqlshiftConfig};
pub use datastore::{Datastore, DatastoreError, Dialect, SqliteDatastore, Transaction};
pub use migration::{
    connect, plan_migrations, ApplyError, Ledger, Migration, MigrationDirection, MigrationError,
    MigrationExecutor, MigrationRecord, MigrationStatus, Migrator, PlannedMigration, DEFAULT_TABLE,
};
pub use source::{DirectorySource, EmbeddedSource, MemorySource, MigrationSource, SourceError};
pub use sqlparse::{split_statements, ParseError, SplitStatements};
pub use template::{TemplateEngine, TemplateError};
