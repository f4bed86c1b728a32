//! Migration executor for running planned migrations.

use super::ledger::Ledger;
use super::types::{ApplyError, MigrationDirection, MigrationError, PlannedMigration};
use crate::datastore::{Datastore, Transaction};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Executor for running migrations.
///
/// Each migration runs in its own transaction together with its ledger
/// update. The batch as a whole is not atomic: a failure stops the run and
/// leaves every earlier migration committed.
pub struct MigrationExecutor {
    datastore: Arc<dyn Datastore>,
    ledger: Ledger,
}

impl MigrationExecutor {
    /// Create a new executor writing to the given ledger.
    pub fn new(datastore: Arc<dyn Datastore>, ledger: Ledger) -> Self {
        Self { datastore, ledger }
    }

    /// Apply a plan in order.
    ///
    /// Returns the number of migrations committed. On failure the error
    /// carries the count committed before the failing migration.
    pub async fn apply_plan(
        &self,
        plan: &[PlannedMigration],
        direction: MigrationDirection,
    ) -> Result<usize, ApplyError> {
        self.ledger.ensure(self.datastore.as_ref()).await?;

        if plan.is_empty() {
            info!(direction = %direction, "No migrations to apply");
            return Ok(0);
        }

        let mut applied = 0;
        for migration in plan {
            info!(
                migration = %migration.id(),
                direction = %direction,
                statements = migration.queries.len(),
                "Applying migration"
            );

            if let Err(error) = self.apply_one(migration, direction).await {
                error!(migration = %migration.id(), error = %error, "Migration failed");
                return Err(ApplyError { applied, error });
            }

            applied += 1;
        }

        info!(direction = %direction, count = applied, "Migrations applied");
        Ok(applied)
    }

    /// Run one migration's statements and ledger update in a transaction.
    async fn apply_one(
        &self,
        migration: &PlannedMigration,
        direction: MigrationDirection,
    ) -> Result<(), MigrationError> {
        let id = migration.id();

        let mut tx = match self.datastore.begin().await {
            Ok(tx) => tx,
            Err(source) => {
                return Err(MigrationError::TransactionBegin {
                    id: id.to_string(),
                    source,
                });
            }
        };

        for (index, statement) in migration.queries.iter().enumerate() {
            debug!(migration = %id, index, "Executing statement");
            if let Err(source) = tx.execute(statement).await {
                rollback(tx.as_mut(), id).await;
                return Err(MigrationError::StatementExecution {
                    id: id.to_string(),
                    index,
                    source,
                });
            }
        }

        if let Err(source) = self.ledger.record(tx.as_mut(), migration, direction).await {
            rollback(tx.as_mut(), id).await;
            return Err(MigrationError::LedgerUpdate {
                id: id.to_string(),
                source,
            });
        }

        // On failure the dropped transaction rolls back
        if let Err(source) = tx.commit().await {
            return Err(MigrationError::Commit {
                id: id.to_string(),
                source,
            });
        }
        Ok(())
    }
}

async fn rollback(tx: &mut dyn Transaction, id: &str) {
    if let Err(e) = tx.rollback().await {
        warn!(migration = %id, error = %e, "Rollback failed");
    }
}
