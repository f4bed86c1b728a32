use super::executor::MigrationExecutor;
use super::ledger::Ledger;
use super::planner::plan_migrations;
use super::types::{
    ApplyError, MigrationDirection, MigrationError, MigrationRecord, MigrationStatus,
    PlannedMigration,
};
use crate::datastore::Datastore;
use crate::source::MigrationSource;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point tying a migration source to a datastore and its ledger.
pub struct Migrator {
    source: Arc<dyn MigrationSource>,
    datastore: Arc<dyn Datastore>,
    ledger: Ledger,
}

impl Migrator {
    pub fn new(source: Arc<dyn MigrationSource>, datastore: Arc<dyn Datastore>) -> Self {
        Self {
            source,
            datastore,
            ledger: Ledger::default(),
        }
    }

    /// Use a ledger table other than the default.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.ledger = Ledger::new(table);
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Compute the plan without touching the datastore's schema.
    pub async fn plan(
        &self,
        direction: MigrationDirection,
        max: usize,
    ) -> Result<Vec<PlannedMigration>, MigrationError> {
        let migrations = self.source.find_migrations().await?;
        let watermark = self.ledger.watermark(self.datastore.as_ref()).await?;

        if let Some(current) = watermark.as_deref() {
            if !migrations.iter().any(|m| m.id == current) {
                // Planning continues from the nearest lower id
                warn!(
                    watermark = %current,
                    "Newest applied migration is missing from the source"
                );
            }
        }

        plan_migrations(migrations, watermark.as_deref(), direction, max)
    }

    /// Apply up to `max` pending migrations (0 for all).
    pub async fn apply_up(&self, max: usize) -> Result<usize, ApplyError> {
        self.apply(MigrationDirection::Up, max).await
    }

    /// Revert up to `max` applied migrations (0 for all).
    pub async fn apply_down(&self, max: usize) -> Result<usize, ApplyError> {
        self.apply(MigrationDirection::Down, max).await
    }

    pub async fn apply(
        &self,
        direction: MigrationDirection,
        max: usize,
    ) -> Result<usize, ApplyError> {
        let plan = self.plan(direction, max).await?;
        info!(direction = %direction, planned = plan.len(), "Starting migration");

        self.executor().apply_plan(&plan, direction).await
    }

    /// Revert the newest applied migration and apply that same migration again.
    ///
    /// Returns the reapplied id, or `None` when nothing is applied. The up
    /// step runs the reverted definition even when the ledger has gaps below
    /// it.
    pub async fn redo(&self) -> Result<Option<String>, ApplyError> {
        let mut down = self.plan(MigrationDirection::Down, 1).await?;
        let Some(newest) = down.pop() else {
            return Ok(None);
        };
        let id = newest.id().to_string();
        let up = PlannedMigration::new(Arc::clone(&newest.migration), MigrationDirection::Up);
        info!(migration = %id, "Redoing migration");

        let executor = self.executor();
        executor
            .apply_plan(&[newest], MigrationDirection::Down)
            .await?;
        executor.apply_plan(&[up], MigrationDirection::Up).await?;
        Ok(Some(id))
    }

    /// Ledger records, ascending by id.
    pub async fn list_applied(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        self.ledger.records(self.datastore.as_ref()).await
    }

    /// Every known migration with its applied time, sorted by id.
    ///
    /// Ledger entries without a definition in the source are included with
    /// `in_source` set to false.
    pub async fn status(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        let migrations = self.source.find_migrations().await?;
        let records = self.list_applied().await?;

        let mut statuses: BTreeMap<String, MigrationStatus> = migrations
            .into_iter()
            .map(|m| {
                let status = MigrationStatus {
                    id: m.id.clone(),
                    applied_at: None,
                    in_source: true,
                };
                (m.id, status)
            })
            .collect();

        for record in records {
            statuses
                .entry(record.id.clone())
                .or_insert_with(|| MigrationStatus {
                    id: record.id.clone(),
                    applied_at: None,
                    in_source: false,
                })
                .applied_at = Some(record.applied_at);
        }

        Ok(statuses.into_values().collect())
    }

    fn executor(&self) -> MigrationExecutor {
        MigrationExecutor::new(Arc::clone(&self.datastore), self.ledger.clone())
    }
}
