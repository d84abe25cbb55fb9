use serde::Serialize;
use std::sync::Arc;

use crate::{
    database::{QuotaLevelCatalog, QuotaRecordStore},
    errors::{AppError, Result},
    models::{CurrentUsage, Decision, MediaKind, QuotaLimits, StudentQuotaRecord},
    services::plan_resolver::PlanTierResolver,
};

/// Admission control for uploads.
///
/// `check_upload` only reads; it is advisory. Two concurrent uploads can both
/// be allowed when one slot remains, so the counters must be moved through
/// `commit_upload`, which re-checks and increments atomically in the store.
pub struct QuotaChecker {
    catalog: Arc<dyn QuotaLevelCatalog>,
    records: Arc<dyn QuotaRecordStore>,
    resolver: PlanTierResolver,
}

struct ResolvedSubject {
    plan_type: String,
    tier: String,
    limits: QuotaLimits,
    usage: CurrentUsage,
}

fn validate_request(subject_id: &str, size_bytes: i64) -> Result<()> {
    if subject_id.trim().is_empty() {
        return Err(AppError::Validation("Subject id must not be empty".to_string()));
    }
    if size_bytes < 0 {
        return Err(AppError::Validation(format!(
            "Candidate size must not be negative, got {}",
            size_bytes
        )));
    }
    Ok(())
}

impl QuotaChecker {
    pub fn new(
        catalog: Arc<dyn QuotaLevelCatalog>,
        records: Arc<dyn QuotaRecordStore>,
        resolver: PlanTierResolver,
    ) -> Self {
        Self {
            catalog,
            records,
            resolver,
        }
    }

    pub fn resolver(&self) -> &PlanTierResolver {
        &self.resolver
    }

    /// Loads the subject's counters and the limits of its tier. A subject
    /// without a record yet is treated as having zero usage on the caller's
    /// plan.
    async fn resolve_subject(&self, subject_id: &str, plan_type: &str) -> Result<ResolvedSubject> {
        let record = self.records.find(subject_id).await?;
        let (plan_type, usage) = match record {
            Some(record) => {
                let usage = record.usage();
                (record.plan_type, usage)
            }
            None => (plan_type.to_string(), CurrentUsage::default()),
        };

        let tier = self.resolver.resolve(&plan_type).to_string();
        let level = match self.catalog.find_active(&tier).await? {
            Some(level) => level,
            None => {
                tracing::error!(
                    subject_id,
                    plan_type = %plan_type,
                    tier = %tier,
                    "No active quota level for resolved tier"
                );
                return Err(AppError::TierNotConfigured(tier));
            }
        };

        Ok(ResolvedSubject {
            plan_type,
            tier,
            limits: QuotaLimits::from(&level),
            usage,
        })
    }

    pub async fn check_upload(
        &self,
        subject_id: &str,
        plan_type: &str,
        kind: MediaKind,
        size_bytes: i64,
    ) -> Result<Decision> {
        validate_request(subject_id, size_bytes)?;

        let subject = self.resolve_subject(subject_id, plan_type).await?;
        let decision = Decision::evaluate(subject.tier, kind, size_bytes, subject.usage, subject.limits);

        match decision.reason {
            None => tracing::info!(
                subject_id,
                media_kind = %kind,
                size_bytes,
                tier = %decision.tier,
                "Upload admitted"
            ),
            Some(reason) => tracing::warn!(
                subject_id,
                media_kind = %kind,
                size_bytes,
                tier = %decision.tier,
                reason = reason.as_str(),
                "Upload denied"
            ),
        }

        Ok(decision)
    }

    /// Applies an admitted upload to the subject's counters. The store
    /// re-runs the checks under its own atomicity guarantee and rejects with
    /// `AppError::CommitRejected` if the upload no longer fits.
    pub async fn commit_upload(
        &self,
        subject_id: &str,
        plan_type: &str,
        kind: MediaKind,
        size_bytes: i64,
    ) -> Result<StudentQuotaRecord> {
        validate_request(subject_id, size_bytes)?;

        let subject = self.resolve_subject(subject_id, plan_type).await?;
        let record = self
            .records
            .commit_upload(subject_id, &subject.plan_type, kind, size_bytes, &subject.limits)
            .await
            .map_err(|e| {
                if let AppError::CommitRejected(reason) = &e {
                    tracing::warn!(subject_id, reason = reason.as_str(), "Commit rejected");
                }
                e
            })?;

        tracing::info!(
            subject_id,
            media_kind = %kind,
            size_bytes,
            version = record.version,
            "Upload committed"
        );

        Ok(record)
    }

    /// Gives back the quota held by a deleted item.
    pub async fn release(
        &self,
        subject_id: &str,
        kind: MediaKind,
        size_bytes: i64,
    ) -> Result<StudentQuotaRecord> {
        validate_request(subject_id, size_bytes)?;

        let record = self.records.release(subject_id, kind, size_bytes).await?;
        tracing::info!(subject_id, media_kind = %kind, size_bytes, "Quota released");

        Ok(record)
    }

    pub async fn quota_status(&self, subject_id: &str, plan_type: &str) -> Result<QuotaStatus> {
        validate_request(subject_id, 0)?;

        let subject = self.resolve_subject(subject_id, plan_type).await?;
        let usage = subject.usage;
        let limits = subject.limits;

        Ok(QuotaStatus {
            tier: subject.tier,
            video_count: QuotaMetric::new(usage.video_count, limits.video_count_limit),
            photo_count: QuotaMetric::new(usage.photo_count, limits.photo_count_limit),
            storage_bytes: QuotaMetric::new(usage.total_used_bytes, limits.storage_limit_bytes),
            limits,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct QuotaStatus {
    pub tier: String,
    pub video_count: QuotaMetric,
    pub photo_count: QuotaMetric,
    pub storage_bytes: QuotaMetric,
    pub limits: QuotaLimits,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct QuotaMetric {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
    pub percentage: u32,
}

impl QuotaMetric {
    pub fn new(used: i64, limit: i64) -> Self {
        let percentage = if limit <= 0 {
            0
        } else {
            (used as f64 / limit as f64 * 100.0) as u32
        };

        Self {
            used,
            limit,
            remaining: (limit - used).max(0),
            percentage,
        }
    }
}
