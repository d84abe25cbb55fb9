use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use media_quota::{
    config::{CompressionSettings, Config},
    create_app,
    database::InMemoryQuotaStore,
    handlers::AppState,
    models::StudentQuotaRecord,
    services::compression::{CompressionEngine, UnavailableVideoEncoder},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup() -> (Router, Arc<InMemoryQuotaStore>) {
    let store = Arc::new(InMemoryQuotaStore::with_default_catalog());
    let engine = CompressionEngine::new(
        CompressionSettings::default(),
        Arc::new(UnavailableVideoEncoder),
    );
    let state = AppState::new(Config::in_memory(), store.clone(), engine)
        .await
        .expect("Failed to build state");
    (create_app(state), store)
}

fn seed(store: &InMemoryQuotaStore, subject_id: &str, photos: i64, used_bytes: i64) {
    let mut record = StudentQuotaRecord::empty(subject_id, "basic");
    record.photo_count = photos;
    record.total_used_bytes = used_bytes;
    store.put_record(record).expect("Failed to seed record");
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn photo_request(subject_id: &str, size_bytes: i64) -> Value {
    json!({
        "subject_id": subject_id,
        "plan_type": "basic",
        "media_kind": "photo",
        "size_bytes": size_bytes
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;
    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_readiness_reports_catalog() {
    let (app, _) = setup().await;
    let (status, body) = get_json(app, "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["catalog"], "healthy");
    assert_eq!(body["checks"]["video_encoder"], "unavailable");
}

#[tokio::test]
async fn test_list_tiers() {
    let (app, _) = setup().await;
    let (status, body) = get_json(app, "/v1/tiers").await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|level| level["name"].as_str())
        .collect();
    assert!(names.contains(&"basic"));
    assert!(names.contains(&"professional"));
}

#[tokio::test]
async fn test_photo_count_limit_reached() {
    let (app, store) = setup().await;
    seed(&store, "student-1", 10, 100_000_000);

    let (status, body) = post_json(app, "/v1/quota/check", photo_request("student-1", 500_000)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "count_limit_reached");
    assert_eq!(body["current_usage"]["photo_count"], 10);
    assert_eq!(body["limits"]["photo_count_limit"], 10);
}

#[tokio::test]
async fn test_photo_too_large() {
    let (app, store) = setup().await;
    seed(&store, "student-2", 3, 0);

    let (_, body) = post_json(app, "/v1/quota/check", photo_request("student-2", 1_200_000)).await;

    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "item_too_large");
}

#[tokio::test]
async fn test_storage_limit_exceeded() {
    let (app, store) = setup().await;
    seed(&store, "student-3", 3, 249_500_000);

    let (_, body) = post_json(app, "/v1/quota/check", photo_request("student-3", 1_000_000)).await;

    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "storage_limit_exceeded");
}

#[tokio::test]
async fn test_limits_are_inclusive() {
    let (app, store) = setup().await;
    // Exactly 1 MB photo landing exactly on the 250 MB storage cap.
    seed(&store, "student-4", 9, 249_000_000);

    let (_, body) = post_json(app, "/v1/quota/check", photo_request("student-4", 1_000_000)).await;

    assert_eq!(body["allowed"], true);
    assert!(body["reason"].is_null());
}

#[tokio::test]
async fn test_check_does_not_mutate_usage() {
    let (app, store) = setup().await;
    seed(&store, "student-5", 1, 1_000);

    let (_, first) = post_json(app.clone(), "/v1/quota/check", photo_request("student-5", 10)).await;
    let (_, second) = post_json(app, "/v1/quota/check", photo_request("student-5", 10)).await;

    assert_eq!(first, second);
    assert_eq!(first["current_usage"]["photo_count"], 1);
}

#[tokio::test]
async fn test_unknown_subject_uses_requested_plan() {
    let (app, _) = setup().await;
    let request = json!({
        "subject_id": "new-student",
        "plan_type": "Premium",
        "media_kind": "video",
        "size_bytes": 400_000_000
    });

    let (status, body) = post_json(app, "/v1/quota/check", request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
    assert_eq!(body["tier"], "professional");
}

#[tokio::test]
async fn test_commit_then_status() {
    let (app, _) = setup().await;

    let (status, record) =
        post_json(app.clone(), "/v1/quota/commit", photo_request("student-6", 400_000)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["photo_count"], 1);
    assert_eq!(record["total_used_bytes"], 400_000);

    let (status, body) = get_json(app, "/v1/quota/student-6/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "basic");
    assert_eq!(body["photo_count"]["used"], 1);
    assert_eq!(body["photo_count"]["remaining"], 9);
    assert_eq!(body["storage_bytes"]["limit"], 250_000_000);
}

#[tokio::test]
async fn test_commit_rejected_when_full() {
    let (app, store) = setup().await;
    seed(&store, "student-7", 10, 0);

    let (status, body) = post_json(app, "/v1/quota/commit", photo_request("student-7", 10)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "count_limit_reached");
}

#[tokio::test]
async fn test_release_returns_quota() {
    let (app, store) = setup().await;
    seed(&store, "student-8", 10, 5_000_000);

    let (status, record) =
        post_json(app.clone(), "/v1/quota/release", photo_request("student-8", 500_000)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["photo_count"], 9);
    assert_eq!(record["total_used_bytes"], 4_500_000);

    let (_, body) = post_json(app, "/v1/quota/check", photo_request("student-8", 500_000)).await;
    assert_eq!(body["allowed"], true);
}

#[tokio::test]
async fn test_negative_size_is_bad_request() {
    let (app, _) = setup().await;

    let (status, _) = post_json(app, "/v1/quota/check", photo_request("student-9", -1)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_count_decisions() {
    let (app, store) = setup().await;
    seed(&store, "student-10", 3, 0);

    post_json(app.clone(), "/v1/quota/check", photo_request("student-10", 1_200_000)).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains(r#"quota_decisions_total{kind="photo",outcome="item_too_large"} 1"#));
}
