use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Decimal megabyte. Stored limits are expressed in these units.
pub const BYTES_PER_MB: f64 = 1_000_000.0;

pub fn bytes_to_mb(bytes: i64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

pub fn mb_to_bytes(mb: f64) -> i64 {
    (mb * BYTES_PER_MB).round() as i64
}

/// A named tier of upload limits.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuotaLevel {
    pub name: String,
    pub video_count_limit: i64,
    pub photo_count_limit: i64,
    pub video_item_size_limit_mb: f64,
    pub photo_item_size_limit_mb: f64,
    pub storage_limit_mb: f64,
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl QuotaLevel {
    pub fn new(
        name: impl Into<String>,
        video_count_limit: i64,
        photo_count_limit: i64,
        video_item_size_limit_mb: f64,
        photo_item_size_limit_mb: f64,
        storage_limit_mb: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            video_count_limit,
            photo_count_limit,
            video_item_size_limit_mb,
            photo_item_size_limit_mb,
            storage_limit_mb,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The tiers shipped with a fresh deployment. Mirrors the seed rows in
    /// `migrations/`.
    pub fn default_catalog() -> Vec<QuotaLevel> {
        vec![
            QuotaLevel::new("basic", 2, 10, 50.0, 1.0, 250.0),
            QuotaLevel::new("standard", 10, 50, 100.0, 5.0, 1_000.0),
            QuotaLevel::new("advanced", 30, 200, 200.0, 10.0, 5_000.0),
            QuotaLevel::new("professional", 100, 1_000, 500.0, 20.0, 20_000.0),
        ]
    }
}

/// Row of the plan type -> tier name lookup table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PlanTierMapping {
    pub plan_type: String,
    pub tier_name: String,
}

impl PlanTierMapping {
    pub fn new(plan_type: impl Into<String>, tier_name: impl Into<String>) -> Self {
        Self {
            plan_type: plan_type.into(),
            tier_name: tier_name.into(),
        }
    }

    pub fn default_mappings() -> Vec<PlanTierMapping> {
        vec![
            PlanTierMapping::new("free", "basic"),
            PlanTierMapping::new("trial", "basic"),
            PlanTierMapping::new("basic", "basic"),
            PlanTierMapping::new("standard", "standard"),
            PlanTierMapping::new("advanced", "advanced"),
            PlanTierMapping::new("professional", "professional"),
            PlanTierMapping::new("premium", "professional"),
        ]
    }
}
