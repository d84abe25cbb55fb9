use async_trait::async_trait;

use crate::{
    database::{
        queries::{PlanMappingQueries, QuotaLevelQueries, QuotaRecordQueries},
        Database, QuotaLevelCatalog, QuotaRecordStore,
    },
    errors::{AppError, Result},
    models::{MediaKind, PlanTierMapping, QuotaLevel, QuotaLimits, StudentQuotaRecord},
};

/// Catalog and record store backed by Postgres.
#[derive(Clone)]
pub struct PgQuotaStore {
    db: Database,
}

impl PgQuotaStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl QuotaLevelCatalog for PgQuotaStore {
    async fn find_active(&self, name: &str) -> Result<Option<QuotaLevel>> {
        QuotaLevelQueries::find_active(self.db.pool(), name).await
    }

    async fn list_active(&self) -> Result<Vec<QuotaLevel>> {
        QuotaLevelQueries::list_active(self.db.pool()).await
    }

    async fn plan_mappings(&self) -> Result<Vec<PlanTierMapping>> {
        PlanMappingQueries::list(self.db.pool()).await
    }
}

#[async_trait]
impl QuotaRecordStore for PgQuotaStore {
    async fn find(&self, subject_id: &str) -> Result<Option<StudentQuotaRecord>> {
        QuotaRecordQueries::find(self.db.pool(), subject_id).await
    }

    async fn commit_upload(
        &self,
        subject_id: &str,
        plan_type: &str,
        kind: MediaKind,
        size_bytes: i64,
        limits: &QuotaLimits,
    ) -> Result<StudentQuotaRecord> {
        let mut tx = self.db.pool().begin().await?;

        QuotaRecordQueries::ensure_exists(&mut tx, subject_id, plan_type).await?;
        let current = QuotaRecordQueries::lock(&mut tx, subject_id).await?;

        if let Some(reason) = limits.first_violation(kind, size_bytes, &current.usage()) {
            tx.rollback().await?;
            return Err(AppError::CommitRejected(reason));
        }

        let updated = QuotaRecordQueries::increment(&mut tx, subject_id, kind, size_bytes).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn release(
        &self,
        subject_id: &str,
        kind: MediaKind,
        size_bytes: i64,
    ) -> Result<StudentQuotaRecord> {
        QuotaRecordQueries::release(self.db.pool(), subject_id, kind, size_bytes)
            .await?
            .ok_or(AppError::NotFound)
    }
}
