use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::models::CurrentUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Photo,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Photo => "photo",
        }
    }

    /// Column holding the live item count for this kind.
    pub(crate) fn count_column(&self) -> &'static str {
        match self {
            MediaKind::Video => "video_count",
            MediaKind::Photo => "photo_count",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaKind::Video),
            "photo" | "image" => Ok(MediaKind::Photo),
            other => Err(format!("Unknown media kind: {}", other)),
        }
    }
}

/// Live per-subject counters.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StudentQuotaRecord {
    pub subject_id: String,
    pub plan_type: String,
    pub video_count: i64,
    pub photo_count: i64,
    pub total_used_bytes: i64,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl StudentQuotaRecord {
    pub fn empty(subject_id: impl Into<String>, plan_type: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            plan_type: plan_type.into(),
            video_count: 0,
            photo_count: 0,
            total_used_bytes: 0,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn count(&self, kind: MediaKind) -> i64 {
        match kind {
            MediaKind::Video => self.video_count,
            MediaKind::Photo => self.photo_count,
        }
    }

    pub fn usage(&self) -> CurrentUsage {
        CurrentUsage {
            video_count: self.video_count,
            photo_count: self.photo_count,
            total_used_bytes: self.total_used_bytes,
        }
    }

    pub(crate) fn apply_upload(&mut self, kind: MediaKind, size_bytes: i64) {
        match kind {
            MediaKind::Video => self.video_count += 1,
            MediaKind::Photo => self.photo_count += 1,
        }
        self.total_used_bytes += size_bytes;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Counters never go below zero, even when a release does not match
    /// anything that was committed.
    pub(crate) fn apply_release(&mut self, kind: MediaKind, size_bytes: i64) {
        match kind {
            MediaKind::Video => self.video_count = (self.video_count - 1).max(0),
            MediaKind::Photo => self.photo_count = (self.photo_count - 1).max(0),
        }
        self.total_used_bytes = (self.total_used_bytes - size_bytes).max(0);
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
