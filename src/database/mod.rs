use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::errors::Result;
use crate::models::{MediaKind, PlanTierMapping, QuotaLevel, QuotaLimits, StudentQuotaRecord};

pub mod memory;
pub mod postgres;
pub mod queries;

pub use memory::InMemoryQuotaStore;
pub use postgres::PgQuotaStore;

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// Read-only view of the tier catalog.
#[async_trait]
pub trait QuotaLevelCatalog: Send + Sync {
    async fn find_active(&self, name: &str) -> Result<Option<QuotaLevel>>;

    async fn list_active(&self) -> Result<Vec<QuotaLevel>>;

    async fn plan_mappings(&self) -> Result<Vec<PlanTierMapping>>;
}

/// Per-subject counters. `commit_upload` is the enforcement point: it must
/// apply the increment only if the limits still hold, as one atomic step.
#[async_trait]
pub trait QuotaRecordStore: Send + Sync {
    async fn find(&self, subject_id: &str) -> Result<Option<StudentQuotaRecord>>;

    /// Fails with `AppError::CommitRejected` when the upload no longer fits.
    async fn commit_upload(
        &self,
        subject_id: &str,
        plan_type: &str,
        kind: MediaKind,
        size_bytes: i64,
        limits: &QuotaLimits,
    ) -> Result<StudentQuotaRecord>;

    /// Fails with `AppError::NotFound` when the subject has no record.
    async fn release(
        &self,
        subject_id: &str,
        kind: MediaKind,
        size_bytes: i64,
    ) -> Result<StudentQuotaRecord>;
}
