use serde::{Deserialize, Serialize};

use crate::models::{bytes_to_mb, mb_to_bytes, MediaKind, QuotaLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    ItemTooLarge,
    CountLimitReached,
    StorageLimitExceeded,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::ItemTooLarge => "item_too_large",
            DenialReason::CountLimitReached => "count_limit_reached",
            DenialReason::StorageLimitExceeded => "storage_limit_exceeded",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUsage {
    pub video_count: i64,
    pub photo_count: i64,
    pub total_used_bytes: i64,
}

impl CurrentUsage {
    pub fn count(&self, kind: MediaKind) -> i64 {
        match kind {
            MediaKind::Video => self.video_count,
            MediaKind::Photo => self.photo_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub video_count_limit: i64,
    pub photo_count_limit: i64,
    pub storage_limit_bytes: i64,
    pub video_item_size_limit_mb: f64,
    pub photo_item_size_limit_mb: f64,
}

impl From<&QuotaLevel> for QuotaLimits {
    fn from(level: &QuotaLevel) -> Self {
        Self {
            video_count_limit: level.video_count_limit,
            photo_count_limit: level.photo_count_limit,
            storage_limit_bytes: mb_to_bytes(level.storage_limit_mb),
            video_item_size_limit_mb: level.video_item_size_limit_mb,
            photo_item_size_limit_mb: level.photo_item_size_limit_mb,
        }
    }
}

impl QuotaLimits {
    pub fn count_limit(&self, kind: MediaKind) -> i64 {
        match kind {
            MediaKind::Video => self.video_count_limit,
            MediaKind::Photo => self.photo_count_limit,
        }
    }

    pub fn item_size_limit_mb(&self, kind: MediaKind) -> f64 {
        match kind {
            MediaKind::Video => self.video_item_size_limit_mb,
            MediaKind::Photo => self.photo_item_size_limit_mb,
        }
    }

    /// Runs the size, count and storage checks in that order and returns the
    /// first one that fails. Every limit is inclusive.
    pub fn first_violation(
        &self,
        kind: MediaKind,
        size_bytes: i64,
        usage: &CurrentUsage,
    ) -> Option<DenialReason> {
        if bytes_to_mb(size_bytes) > self.item_size_limit_mb(kind) {
            return Some(DenialReason::ItemTooLarge);
        }

        if usage.count(kind) >= self.count_limit(kind) {
            return Some(DenialReason::CountLimitReached);
        }

        if usage.total_used_bytes.saturating_add(size_bytes) > self.storage_limit_bytes {
            return Some(DenialReason::StorageLimitExceeded);
        }

        None
    }
}

/// Outcome of an admission check. Carries everything needed to explain the
/// result without a second query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
    pub message: Option<String>,
    pub tier: String,
    pub media_kind: MediaKind,
    pub candidate_size_bytes: i64,
    pub current_usage: CurrentUsage,
    pub limits: QuotaLimits,
}

impl Decision {
    pub fn evaluate(
        tier: impl Into<String>,
        kind: MediaKind,
        size_bytes: i64,
        usage: CurrentUsage,
        limits: QuotaLimits,
    ) -> Self {
        let reason = limits.first_violation(kind, size_bytes, &usage);
        let message = reason.map(|r| describe(r, kind, size_bytes, &usage, &limits));

        Self {
            allowed: reason.is_none(),
            reason,
            message,
            tier: tier.into(),
            media_kind: kind,
            candidate_size_bytes: size_bytes,
            current_usage: usage,
            limits,
        }
    }

    pub fn projected_bytes(&self) -> i64 {
        self.current_usage
            .total_used_bytes
            .saturating_add(self.candidate_size_bytes)
    }
}

pub fn describe(
    reason: DenialReason,
    kind: MediaKind,
    size_bytes: i64,
    usage: &CurrentUsage,
    limits: &QuotaLimits,
) -> String {
    let label = match kind {
        MediaKind::Video => "Video",
        MediaKind::Photo => "Photo",
    };

    match reason {
        DenialReason::ItemTooLarge => format!(
            "{} is {:.2} MB, which exceeds the {:.2} MB per-{} limit",
            label,
            bytes_to_mb(size_bytes),
            limits.item_size_limit_mb(kind),
            kind
        ),
        DenialReason::CountLimitReached => format!(
            "{} limit reached ({} of {})",
            label,
            usage.count(kind),
            limits.count_limit(kind)
        ),
        DenialReason::StorageLimitExceeded => format!(
            "Storage limit would be exceeded ({:.2} MB of {:.2} MB)",
            bytes_to_mb(usage.total_used_bytes.saturating_add(size_bytes)),
            bytes_to_mb(limits.storage_limit_bytes)
        ),
    }
}
