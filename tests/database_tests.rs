use media_quota::{
    database::{queries::QuotaRecordQueries, Database, PgQuotaStore, QuotaLevelCatalog, QuotaRecordStore},
    errors::AppError,
    models::{DenialReason, MediaKind, QuotaLevel, QuotaLimits},
};
use serial_test::serial;
use std::env;

/// Connects to `TEST_DATABASE_URL`, or returns `None` so the suite is skipped
/// on machines without Postgres.
async fn setup_test_db() -> Option<PgQuotaStore> {
    let database_url = match env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping Postgres tests");
            return None;
        }
    };

    let db = Database::new(&database_url).await.expect("Failed to connect to test database");
    db.migrate().await.expect("Failed to run migrations");

    // Clean up any existing test data
    sqlx::query("TRUNCATE TABLE student_quota_records")
        .execute(db.pool())
        .await
        .expect("Failed to clean test database");
    sqlx::query("DELETE FROM quota_levels WHERE is_active = FALSE")
        .execute(db.pool())
        .await
        .expect("Failed to clean retired levels");

    Some(PgQuotaStore::new(db))
}

fn basic_limits() -> QuotaLimits {
    QuotaLimits::from(&QuotaLevel::default_catalog()[0])
}

async fn set_usage(store: &PgQuotaStore, subject_id: &str, photos: i64, used_bytes: i64) {
    sqlx::query(
        "UPDATE student_quota_records SET photo_count = $2, total_used_bytes = $3 WHERE subject_id = $1",
    )
    .bind(subject_id)
    .bind(photos)
    .bind(used_bytes)
    .execute(store.database().pool())
    .await
    .expect("Failed to set usage");
}

#[tokio::test]
#[serial]
async fn test_seeded_catalog() {
    let Some(store) = setup_test_db().await else { return };

    let basic = store.find_active("basic").await.unwrap().unwrap();
    assert_eq!(basic.photo_count_limit, 10);
    assert_eq!(basic.storage_limit_mb, 250.0);

    let mappings = store.plan_mappings().await.unwrap();
    assert!(mappings.iter().any(|m| m.plan_type == "premium" && m.tier_name == "professional"));
}

#[tokio::test]
#[serial]
async fn test_first_commit_creates_record() {
    let Some(store) = setup_test_db().await else { return };

    assert!(store.find("student-1").await.unwrap().is_none());

    let record = store
        .commit_upload("student-1", "basic", MediaKind::Photo, 400_000, &basic_limits())
        .await
        .unwrap();
    assert_eq!(record.plan_type, "basic");
    assert_eq!(record.photo_count, 1);
    assert_eq!(record.video_count, 0);
    assert_eq!(record.total_used_bytes, 400_000);
    assert_eq!(record.version, 1);

    let stored = store.find("student-1").await.unwrap().unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
#[serial]
async fn test_rejected_commit_leaves_row_unchanged() {
    let Some(store) = setup_test_db().await else { return };
    let limits = basic_limits();

    store
        .commit_upload("student-2", "basic", MediaKind::Photo, 1_000, &limits)
        .await
        .unwrap();
    set_usage(&store, "student-2", 10, 5_000_000).await;
    let before = store.find("student-2").await.unwrap().unwrap();

    let err = store
        .commit_upload("student-2", "basic", MediaKind::Photo, 1_000, &limits)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CommitRejected(DenialReason::CountLimitReached)));

    let after = store.find("student-2").await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
#[serial]
async fn test_storage_checked_inside_commit() {
    let Some(store) = setup_test_db().await else { return };
    let limits = basic_limits();

    store
        .commit_upload("student-3", "basic", MediaKind::Photo, 1_000, &limits)
        .await
        .unwrap();
    set_usage(&store, "student-3", 3, 249_500_000).await;

    let err = store
        .commit_upload("student-3", "basic", MediaKind::Photo, 1_000_000, &limits)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CommitRejected(DenialReason::StorageLimitExceeded)));

    // Landing exactly on the cap is allowed.
    let record = store
        .commit_upload("student-3", "basic", MediaKind::Photo, 500_000, &limits)
        .await
        .unwrap();
    assert_eq!(record.total_used_bytes, 250_000_000);
}

#[tokio::test]
#[serial]
async fn test_release_saturates_at_zero() {
    let Some(store) = setup_test_db().await else { return };

    store
        .commit_upload("student-4", "basic", MediaKind::Photo, 300, &basic_limits())
        .await
        .unwrap();

    let record = store.release("student-4", MediaKind::Photo, 1_000).await.unwrap();
    assert_eq!(record.photo_count, 0);
    assert_eq!(record.total_used_bytes, 0);

    let record = store.release("student-4", MediaKind::Video, 1_000).await.unwrap();
    assert_eq!(record.video_count, 0);
    assert_eq!(record.total_used_bytes, 0);
    assert_eq!(record.version, 3);
}

#[tokio::test]
#[serial]
async fn test_release_unknown_subject() {
    let Some(store) = setup_test_db().await else { return };

    let row = QuotaRecordQueries::release(store.database().pool(), "nobody", MediaKind::Photo, 10)
        .await
        .unwrap();
    assert!(row.is_none());

    let err = store.release("nobody", MediaKind::Photo, 10).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
#[serial]
async fn test_concurrent_commits_admit_exactly_one_for_last_slot() {
    let Some(store) = setup_test_db().await else { return };
    let limits = basic_limits();

    store
        .commit_upload("student-5", "basic", MediaKind::Photo, 1_000, &limits)
        .await
        .unwrap();
    set_usage(&store, "student-5", 9, 1_000).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let limits = limits.clone();
        handles.push(tokio::spawn(async move {
            store
                .commit_upload("student-5", "basic", MediaKind::Photo, 1_000, &limits)
                .await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(AppError::CommitRejected(DenialReason::CountLimitReached)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(admitted, 1);
    let record = store.find("student-5").await.unwrap().unwrap();
    assert_eq!(record.photo_count, 10);
    assert_eq!(record.total_used_bytes, 2_000);
}

#[tokio::test]
#[serial]
async fn test_one_active_level_per_name() {
    let Some(store) = setup_test_db().await else { return };
    let pool = store.database().pool();

    let insert = "INSERT INTO quota_levels \
        (name, video_count_limit, photo_count_limit, video_item_size_limit_mb, \
         photo_item_size_limit_mb, storage_limit_mb, is_active) \
        VALUES ('basic', 1, 1, 1, 1, 1, $1)";

    let duplicate = sqlx::query(insert).bind(true).execute(pool).await;
    assert!(duplicate.is_err());

    sqlx::query(insert)
        .bind(false)
        .execute(pool)
        .await
        .expect("Retired rows may share a name");

    let active = store.find_active("basic").await.unwrap().unwrap();
    assert_eq!(active.photo_count_limit, 10);
}
