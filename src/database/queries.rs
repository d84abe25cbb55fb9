use sqlx::{PgConnection, PgPool};

use crate::errors::Result;
use crate::models::*;

const LEVEL_COLUMNS: &str = "name, video_count_limit, photo_count_limit, \
    video_item_size_limit_mb, photo_item_size_limit_mb, storage_limit_mb, \
    is_active, created_at, updated_at";

const RECORD_COLUMNS: &str =
    "subject_id, plan_type, video_count, photo_count, total_used_bytes, version, updated_at";

pub struct QuotaLevelQueries;

impl QuotaLevelQueries {
    pub async fn find_active(pool: &PgPool, name: &str) -> Result<Option<QuotaLevel>> {
        let sql = format!(
            "SELECT {} FROM quota_levels WHERE name = $1 AND is_active = TRUE",
            LEVEL_COLUMNS
        );

        let level = sqlx::query_as::<_, QuotaLevel>(&sql)
            .bind(name)
            .fetch_optional(pool)
            .await?;

        Ok(level)
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<QuotaLevel>> {
        let sql = format!(
            "SELECT {} FROM quota_levels WHERE is_active = TRUE ORDER BY storage_limit_mb, name",
            LEVEL_COLUMNS
        );

        let levels = sqlx::query_as::<_, QuotaLevel>(&sql)
            .fetch_all(pool)
            .await?;

        Ok(levels)
    }
}

pub struct PlanMappingQueries;

impl PlanMappingQueries {
    pub async fn list(pool: &PgPool) -> Result<Vec<PlanTierMapping>> {
        let mappings = sqlx::query_as::<_, PlanTierMapping>(
            "SELECT plan_type, tier_name FROM plan_tier_mappings ORDER BY plan_type",
        )
        .fetch_all(pool)
        .await?;

        Ok(mappings)
    }
}

pub struct QuotaRecordQueries;

impl QuotaRecordQueries {
    pub async fn find(pool: &PgPool, subject_id: &str) -> Result<Option<StudentQuotaRecord>> {
        let sql = format!(
            "SELECT {} FROM student_quota_records WHERE subject_id = $1",
            RECORD_COLUMNS
        );

        let record = sqlx::query_as::<_, StudentQuotaRecord>(&sql)
            .bind(subject_id)
            .fetch_optional(pool)
            .await?;

        Ok(record)
    }

    /// Creates a zeroed record on the subject's first commit.
    pub async fn ensure_exists(
        conn: &mut PgConnection,
        subject_id: &str,
        plan_type: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO student_quota_records (subject_id, plan_type)
            VALUES ($1, $2)
            ON CONFLICT (subject_id) DO NOTHING
            "#,
        )
        .bind(subject_id)
        .bind(plan_type)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Row-locks the record until the surrounding transaction ends.
    pub async fn lock(conn: &mut PgConnection, subject_id: &str) -> Result<StudentQuotaRecord> {
        let sql = format!(
            "SELECT {} FROM student_quota_records WHERE subject_id = $1 FOR UPDATE",
            RECORD_COLUMNS
        );

        let record = sqlx::query_as::<_, StudentQuotaRecord>(&sql)
            .bind(subject_id)
            .fetch_one(conn)
            .await?;

        Ok(record)
    }

    pub async fn increment(
        conn: &mut PgConnection,
        subject_id: &str,
        kind: MediaKind,
        size_bytes: i64,
    ) -> Result<StudentQuotaRecord> {
        let column = kind.count_column();
        let sql = format!(
            r#"
            UPDATE student_quota_records
            SET {column} = {column} + 1,
                total_used_bytes = total_used_bytes + $2,
                version = version + 1,
                updated_at = NOW()
            WHERE subject_id = $1
            RETURNING {returning}
            "#,
            column = column,
            returning = RECORD_COLUMNS
        );

        let record = sqlx::query_as::<_, StudentQuotaRecord>(&sql)
            .bind(subject_id)
            .bind(size_bytes)
            .fetch_one(conn)
            .await?;

        Ok(record)
    }

    pub async fn release(
        pool: &PgPool,
        subject_id: &str,
        kind: MediaKind,
        size_bytes: i64,
    ) -> Result<Option<StudentQuotaRecord>> {
        let column = kind.count_column();
        let sql = format!(
            r#"
            UPDATE student_quota_records
            SET {column} = GREATEST({column} - 1, 0),
                total_used_bytes = GREATEST(total_used_bytes - $2, 0),
                version = version + 1,
                updated_at = NOW()
            WHERE subject_id = $1
            RETURNING {returning}
            "#,
            column = column,
            returning = RECORD_COLUMNS
        );

        let record = sqlx::query_as::<_, StudentQuotaRecord>(&sql)
            .bind(subject_id)
            .bind(size_bytes)
            .fetch_optional(pool)
            .await?;

        Ok(record)
    }
}
