//! Migration planning and execution.
//!
//! This module decides which migrations to run against a datastore and runs
//! them, recording progress in a ledger table.
//!
//! # Overview
//!
//! - A [`MigrationSource`](crate::source::MigrationSource) yields the
//!   [`Migration`] definitions, in any order
//! - The planner sorts them by id and selects what lies after (up) or at and
//!   before (down) the ledger's watermark, the highest applied id
//! - The [`MigrationExecutor`] runs each planned migration and its ledger
//!   update in one transaction, stopping at the first failure
//! - Earlier migrations stay committed when a later one fails; the returned
//!   [`ApplyError`] says how many made it
//!
//! Running two migrators against the same database at once is not supported.
//!
//! # Usage
//!
//! ```ignore
//! let store = connect("sqlite3", "app.db")?;
//! let migrator = Migrator::new(Arc::new(DirectorySource::new("migrations")), store);
//! let applied = migrator.apply_up(0).await?;
//! ```

mod executor;
mod ledger;
mod migrator;
pub mod planner;
mod types;

pub use executor::MigrationExecutor;
pub use ledger::{Ledger, DEFAULT_TABLE};
pub use migrator::Migrator;
pub use planner::plan_migrations;
pub use types::{
    ApplyError, Migration, MigrationDirection, MigrationError, MigrationRecord, MigrationStatus,
    PlannedMigration,
};

use crate::datastore::{self, Datastore, DatastoreError, Dialect};
use std::sync::Arc;

/// Open a datastore by dialect name.
///
/// Unknown dialects, and dialects without a compiled driver, are reported as
/// [`MigrationError::UnknownTarget`] before any connection is attempted.
pub fn connect(dialect: &str, datasource: &str) -> Result<Arc<dyn Datastore>, MigrationError> {
    let dialect = Dialect::from_name(dialect)
        .map_err(|_| MigrationError::UnknownTarget(dialect.to_string()))?;

    datastore::open(dialect, datasource).map_err(|e| match e {
        DatastoreError::UnsupportedDialect(d) => MigrationError::UnknownTarget(d.to_string()),
        other => MigrationError::Connect(other),
    })
}
