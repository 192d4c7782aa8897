//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use gasto_core::models::JobStatus;
use gasto_core::test_utils::MockPluggyServer;
use gasto_core::MockBackend;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.jobs.retry_delay_secs = 0;
    settings
}

fn setup_test_app(db: &Database, pluggy: Option<PluggyClient>) -> Router {
    let state = AppState::new(
        db.clone(),
        &test_settings(),
        Some(AIClient::Mock(MockBackend::new())),
        pluggy,
    );
    create_router(state, &ServerConfig::default())
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Mock Pluggy with one item holding one account with two March transactions
async fn pluggy_with_data() -> MockPluggyServer {
    let server = MockPluggyServer::start().await;
    server.add_account("item-1", "pl-acc-1", "Nubank", 100.0);
    server.add_transaction("pl-acc-1", "pl-tx-1", "Supermercado Dia", -120.5, "2024-03-03");
    server.add_transaction("pl-acc-1", "pl-tx-2", "Posto Shell", -200.0, "2024-03-20");
    server
}

async fn link(app: &Router) -> i64 {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users/1/accounts/link",
            serde_json::json!({"item_id": "item-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    json[0]["id"].as_i64().unwrap()
}

// ========== Health / Categories ==========

#[tokio::test]
async fn test_health() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, None);

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["llm"], true);
    assert_eq!(json["pluggy"], false);
}

#[tokio::test]
async fn test_list_categories() {
    let db = Database::in_memory().unwrap();
    db.seed_default_categories().unwrap();
    let app = setup_test_app(&db, None);

    let response = app.oneshot(get("/api/categories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let categories = json.as_array().unwrap();
    assert_eq!(categories.len(), 8);
    assert!(categories.iter().any(|c| c["name"] == "Transporte"));
}

#[tokio::test]
async fn test_classify_reports_source() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, None);
    let body = serde_json::json!({"description": "Farmácia São João", "amount": "-35.90"});

    let response = app
        .clone()
        .oneshot(post_json("/api/classify", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Saúde");
    assert_eq!(json["source"], "llm");

    // Same input again comes from the in-process cache
    let response = app.oneshot(post_json("/api/classify", body)).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["source"], "ephemeral_cache");
}

#[tokio::test]
async fn test_classify_without_amount_when_llm_fails() {
    let db = Database::in_memory().unwrap();
    let state = AppState::new(
        db.clone(),
        &test_settings(),
        Some(AIClient::Mock(MockBackend::failing())),
        None,
    );
    let app = create_router(state, &ServerConfig::default());

    let response = app
        .oneshot(post_json(
            "/api/classify",
            serde_json::json!({"description": "UBER *TRIP"}),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Transporte");
    assert_eq!(json["source"], "fallback");
}

// ========== Accounts / Sync ==========

#[tokio::test]
async fn test_link_without_pluggy_is_unavailable() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, None);

    let response = app
        .oneshot(post_json(
            "/api/users/1/accounts/link",
            serde_json::json!({"item_id": "item-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_link_sync_and_list() {
    let pluggy = pluggy_with_data().await;
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, Some(pluggy.client()));

    let account_id = link(&app).await;

    let uri = format!("/api/users/1/accounts/{}/sync", account_id);
    let body = serde_json::json!({"start_date": "2024-03-01", "end_date": "2024-03-31"});
    let response = app
        .clone()
        .oneshot(post_json(&uri, body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["inserted"], 2);
    assert_eq!(json["skipped"], 0);

    let response = app.clone().oneshot(post_json(&uri, body)).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["inserted"], 0);
    assert_eq!(json["skipped"], 2);

    let response = app.oneshot(get("/api/users/1/accounts")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["bank_name"], "Nubank");
    assert_eq!(json[0]["is_active"], true);
}

#[tokio::test]
async fn test_sync_requires_both_dates() {
    let pluggy = pluggy_with_data().await;
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, Some(pluggy.client()));
    let account_id = link(&app).await;
    let uri = format!("/api/users/1/accounts/{}/sync", account_id);

    for body in [
        serde_json::json!({}),
        serde_json::json!({"start_date": "2024-03-01"}),
        serde_json::json!({"start_date": "2024-03-01", "end_date": "31/03/2024"}),
        serde_json::json!({"start_date": "2024-04-01", "end_date": "2024-03-01"}),
    ] {
        let response = app.clone().oneshot(post_json(&uri, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // Only the link reached the aggregator
    assert_eq!(pluggy.hits(), 1);
}

#[tokio::test]
async fn test_sync_upstream_failure_is_bad_gateway() {
    let pluggy = pluggy_with_data().await;
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, Some(pluggy.client()));
    let account_id = link(&app).await;
    pluggy.set_failing(true);

    let response = app
        .oneshot(post_json(
            &format!("/api/users/1/accounts/{}/sync", account_id),
            serde_json::json!({"start_date": "2024-03-01", "end_date": "2024-03-31"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = get_body_json(response).await;
    // Upstream details stay in the logs
    assert_eq!(json["error"], "Bank aggregator request failed");
}

#[tokio::test]
async fn test_disconnect_account() {
    let pluggy = pluggy_with_data().await;
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, Some(pluggy.client()));
    let account_id = link(&app).await;
    let uri = format!("/api/users/1/accounts/{}", account_id);

    let delete = |uri: &str| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(delete(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!db.get_account(1, account_id).unwrap().unwrap().is_active);

    // Other users cannot touch it
    let response = app
        .clone()
        .oneshot(delete(&format!("/api/users/2/accounts/{}", account_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Syncing a disconnected account is a 404
    let response = app
        .oneshot(post_json(
            &format!("{}/sync", uri),
            serde_json::json!({"start_date": "2024-03-01", "end_date": "2024-03-31"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Jobs ==========

#[tokio::test]
async fn test_categorize_returns_accepted_and_completes() {
    let pluggy = pluggy_with_data().await;
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, Some(pluggy.client()));
    let account_id = link(&app).await;
    app.clone()
        .oneshot(post_json(
            &format!("/api/users/1/accounts/{}/sync", account_id),
            serde_json::json!({"start_date": "2024-03-01", "end_date": "2024-03-31"}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users/1/transactions/categorize",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = get_body_json(response).await;
    assert_eq!(json["message"], "Categorization started");
    let task_id = json["task_id"].as_i64().unwrap();

    // Poll until the worker finishes
    let mut status = String::new();
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/jobs/{}", task_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job = get_body_json(response).await;
        status = job["status"].as_str().unwrap().to_string();
        if status == JobStatus::Completed.as_str() {
            assert_eq!(job["summary"]["processed"], 2);
            assert_eq!(job["user_id"], 1);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(status, "completed");
    assert!(db.uncategorized_transactions(1).unwrap().is_empty());

    let response = app.oneshot(get("/api/users/1/jobs")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], task_id);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app(&db, None);

    let response = app.oneshot(get("/api/jobs/4242")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Job not found");
}
