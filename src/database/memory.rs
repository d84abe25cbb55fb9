use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{
    database::{QuotaLevelCatalog, QuotaRecordStore},
    errors::{AppError, Result},
    models::{MediaKind, PlanTierMapping, QuotaLevel, QuotaLimits, StudentQuotaRecord},
};

/// Catalog and record store held in process memory. Each commit runs under a
/// single lock, so the check and the increment cannot interleave.
pub struct InMemoryQuotaStore {
    levels: Mutex<Vec<QuotaLevel>>,
    mappings: Mutex<Vec<PlanTierMapping>>,
    records: Mutex<HashMap<String, StudentQuotaRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Quota store lock poisoned")))
}

impl InMemoryQuotaStore {
    pub fn new(levels: Vec<QuotaLevel>, mappings: Vec<PlanTierMapping>) -> Self {
        Self {
            levels: Mutex::new(levels),
            mappings: Mutex::new(mappings),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_catalog() -> Self {
        Self::new(QuotaLevel::default_catalog(), PlanTierMapping::default_mappings())
    }

    /// Overwrites a subject's counters.
    pub fn put_record(&self, record: StudentQuotaRecord) -> Result<()> {
        lock(&self.records)?.insert(record.subject_id.clone(), record);
        Ok(())
    }

    /// Retires any active level with the same name before inserting, keeping
    /// at most one active row per name.
    pub fn upsert_level(&self, level: QuotaLevel) -> Result<()> {
        let mut levels = lock(&self.levels)?;
        if level.is_active {
            for existing in levels.iter_mut().filter(|l| l.name == level.name) {
                existing.is_active = false;
            }
        }
        levels.push(level);
        Ok(())
    }

    pub fn deactivate_level(&self, name: &str) -> Result<()> {
        for level in lock(&self.levels)?.iter_mut().filter(|l| l.name == name) {
            level.is_active = false;
        }
        Ok(())
    }
}

#[async_trait]
impl QuotaLevelCatalog for InMemoryQuotaStore {
    async fn find_active(&self, name: &str) -> Result<Option<QuotaLevel>> {
        let levels = lock(&self.levels)?;
        Ok(levels.iter().find(|l| l.is_active && l.name == name).cloned())
    }

    async fn list_active(&self) -> Result<Vec<QuotaLevel>> {
        let levels = lock(&self.levels)?;
        Ok(levels.iter().filter(|l| l.is_active).cloned().collect())
    }

    async fn plan_mappings(&self) -> Result<Vec<PlanTierMapping>> {
        Ok(lock(&self.mappings)?.clone())
    }
}

#[async_trait]
impl QuotaRecordStore for InMemoryQuotaStore {
    async fn find(&self, subject_id: &str) -> Result<Option<StudentQuotaRecord>> {
        Ok(lock(&self.records)?.get(subject_id).cloned())
    }

    async fn commit_upload(
        &self,
        subject_id: &str,
        plan_type: &str,
        kind: MediaKind,
        size_bytes: i64,
        limits: &QuotaLimits,
    ) -> Result<StudentQuotaRecord> {
        let mut records = lock(&self.records)?;
        let record = records
            .entry(subject_id.to_string())
            .or_insert_with(|| StudentQuotaRecord::empty(subject_id, plan_type));

        if let Some(reason) = limits.first_violation(kind, size_bytes, &record.usage()) {
            return Err(AppError::CommitRejected(reason));
        }

        record.apply_upload(kind, size_bytes);
        Ok(record.clone())
    }

    async fn release(
        &self,
        subject_id: &str,
        kind: MediaKind,
        size_bytes: i64,
    ) -> Result<StudentQuotaRecord> {
        let mut records = lock(&self.records)?;
        let record = records.get_mut(subject_id).ok_or(AppError::NotFound)?;
        record.apply_release(kind, size_bytes);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DenialReason;
    use std::sync::Arc;

    fn basic_limits() -> QuotaLimits {
        QuotaLimits::from(&QuotaLevel::default_catalog()[0])
    }

    #[tokio::test]
    async fn test_commit_creates_record_lazily() {
        let store = InMemoryQuotaStore::with_default_catalog();
        assert!(store.find("s-1").await.unwrap().is_none());

        let record = store
            .commit_upload("s-1", "free", MediaKind::Photo, 400_000, &basic_limits())
            .await
            .unwrap();

        assert_eq!(record.plan_type, "free");
        assert_eq!(record.photo_count, 1);
        assert_eq!(record.total_used_bytes, 400_000);
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_commit_rejects_when_full() {
        let store = InMemoryQuotaStore::with_default_catalog();
        let mut record = StudentQuotaRecord::empty("s-1", "basic");
        record.photo_count = 10;
        store.put_record(record).unwrap();

        let err = store
            .commit_upload("s-1", "basic", MediaKind::Photo, 1_000, &basic_limits())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CommitRejected(DenialReason::CountLimitReached)));
        assert_eq!(store.find("s-1").await.unwrap().unwrap().photo_count, 10);
    }

    #[tokio::test]
    async fn test_concurrent_commits_never_overshoot() {
        let store = Arc::new(InMemoryQuotaStore::with_default_catalog());
        let mut record = StudentQuotaRecord::empty("s-1", "basic");
        record.photo_count = 9;
        store.put_record(record).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .commit_upload("s-1", "basic", MediaKind::Photo, 1_000, &basic_limits())
                    .await
                    .is_ok()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(store.find("s-1").await.unwrap().unwrap().photo_count, 10);
    }

    #[tokio::test]
    async fn test_release_requires_record() {
        let store = InMemoryQuotaStore::with_default_catalog();
        let err = store.release("missing", MediaKind::Video, 10).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_upsert_level_keeps_one_active_per_name() {
        let store = InMemoryQuotaStore::with_default_catalog();
        store
            .upsert_level(QuotaLevel::new("basic", 5, 20, 50.0, 2.0, 500.0))
            .unwrap();

        let active: Vec<_> = store
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .filter(|l| l.name == "basic")
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].photo_count_limit, 20);
    }
}
