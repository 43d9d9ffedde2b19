//! HTTP surface tests
//!
//! Drives the full actix app: auth gate, ingestion, duplicate handling,
//! statistics and delete-all.

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;

use txn_stats_rs::api::{self, AppState};
use txn_stats_rs::config::{AuthConfig, HttpConfig};
use txn_stats_rs::context::ServiceContext;
use txn_stats_rs::dispatcher::{DispatchError, RecomputeRequest, TaskDispatcher};
use txn_stats_rs::engine::RecomputeService;
use txn_stats_rs::persistence::{LedgerStore, MemoryStore, TransactionStore};

const API_KEY: &str = "1234567890";

/// Runs the recompute on the calling thread, so statistics are current as soon
/// as the POST returns.
struct InlineDispatcher {
    recompute: RecomputeService,
}

impl TaskDispatcher for InlineDispatcher {
    fn enqueue(&self, _request: RecomputeRequest) -> Result<(), DispatchError> {
        let _ = self.recompute.recompute();
        Ok(())
    }
}

fn auth() -> AuthConfig {
    AuthConfig {
        api_key: API_KEY.to_string(),
        ..AuthConfig::default()
    }
}

fn state(store: Arc<dyn LedgerStore>) -> AppState {
    let dispatcher = Arc::new(InlineDispatcher {
        recompute: RecomputeService::new(store.clone()),
    });
    AppState::new(store, dispatcher, ServiceContext::new_simulated(1_700_000_000_000))
}

macro_rules! app {
    ($store:expr) => {
        app!($store, HttpConfig::default())
    };
    ($store:expr, $http:expr) => {{
        let http = $http;
        let auth = auth();
        test::init_service(
            App::new()
                .app_data(web::Data::new(state($store)))
                .configure(move |cfg| api::config(cfg, &http, &auth)),
        )
        .await
    }};
}

fn tx_body(id: &str, amount: f64) -> Value {
    json!({
        "transaction_id": id,
        "user_id": "user1",
        "amount": amount,
        "currency": "USD",
        "timestamp": "2024-05-01T12:00:00Z"
    })
}

fn post_tx(id: &str, amount: f64) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1/transactions")
        .insert_header(("x-api-key", API_KEY))
        .set_json(tx_body(id, amount))
}

fn get_stats() -> test::TestRequest {
    test::TestRequest::get()
        .uri("/api/v1/statistics")
        .insert_header(("x-api-key", API_KEY))
}

#[actix_web::test]
async fn test_create_transaction() {
    let app = app!(Arc::new(MemoryStore::new()));

    let resp = test::call_service(&app, post_tx("test123", 100.5).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Transaction received");
    assert!(body["task_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[actix_web::test]
async fn test_timestamp_is_optional() {
    let store = Arc::new(MemoryStore::new());
    let app = app!(store.clone());

    let req = test::TestRequest::post()
        .uri("/api/v1/transactions")
        .insert_header(("x-api-key", API_KEY))
        .set_json(json!({
            "transaction_id": "no-ts",
            "user_id": "user1",
            "amount": -20.0,
            "currency": "EUR"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let stored = store.get("no-ts").unwrap().unwrap();
    assert_eq!(stored.timestamp.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(stored.amount, -20.0);
}

#[actix_web::test]
async fn test_duplicate_transaction() {
    let store = Arc::new(MemoryStore::new());
    let app = app!(store.clone());

    let first = test::call_service(&app, post_tx("duplicate_test", 100.5).to_request()).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = test::call_service(&app, post_tx("duplicate_test", 100.5).to_request()).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(second).await;
    assert!(body["detail"].as_str().unwrap().contains("already exists"));

    assert_eq!(store.get_all().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_get_statistics() {
    let app = app!(Arc::new(MemoryStore::new()));

    for i in 0..3 {
        let resp = test::call_service(
            &app,
            post_tx(&format!("test{}", i), 100.0 * (i + 1) as f64).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = test::call_service(&app, get_stats().to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_transactions"], 3);
    assert_eq!(body["average_transaction_amount"], 200.0);
    assert_eq!(body["top_transactions"].as_array().unwrap().len(), 3);
    assert_eq!(body["top_transactions"][0]["amount"], 300.0);
    assert_eq!(body["top_transactions"][0]["transaction_id"], "test2");
}

#[actix_web::test]
async fn test_statistics_before_any_transaction() {
    let app = app!(Arc::new(MemoryStore::new()));

    let resp = test::call_service(&app, get_stats().to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "total_transactions": 0,
            "average_transaction_amount": 0.0,
            "top_transactions": []
        })
    );
}

#[actix_web::test]
async fn test_delete_transactions() {
    let app = app!(Arc::new(MemoryStore::new()));
    test::call_service(&app, post_tx("delete_test", 100.5).to_request()).await;

    let req = test::TestRequest::delete()
        .uri("/api/v1/transactions")
        .insert_header(("x-api-key", API_KEY))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(&app, get_stats().to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_transactions"], 0);
    assert_eq!(body["average_transaction_amount"], 0.0);
    assert!(body["top_transactions"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_missing_or_wrong_key_is_forbidden() {
    let store = Arc::new(MemoryStore::new());
    let app = app!(store.clone());

    let no_key = test::TestRequest::post()
        .uri("/api/v1/transactions")
        .set_json(tx_body("sneaky", 1.0))
        .to_request();
    assert_eq!(test::call_service(&app, no_key).await.status(), StatusCode::FORBIDDEN);

    let wrong_key = test::TestRequest::get()
        .uri("/api/v1/statistics")
        .insert_header(("x-api-key", "wrong"))
        .to_request();
    assert_eq!(test::call_service(&app, wrong_key).await.status(), StatusCode::FORBIDDEN);

    let delete = test::TestRequest::delete()
        .uri("/api/v1/transactions")
        .to_request();
    assert_eq!(test::call_service(&app, delete).await.status(), StatusCode::FORBIDDEN);

    assert!(store.get_all().unwrap().is_empty());
}

#[actix_web::test]
async fn test_authorization_header_accepted() {
    let app = app!(Arc::new(MemoryStore::new()));

    let req = test::TestRequest::get()
        .uri("/api/v1/statistics")
        .insert_header(("Authorization", API_KEY))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_health_and_metrics_are_open() {
    let app = app!(Arc::new(MemoryStore::new()));

    let health = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(health.status(), StatusCode::OK);
    let body: Value = test::read_body_json(health).await;
    assert_eq!(body["status"], "ok");

    let metrics = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(metrics.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_malformed_body_is_unprocessable() {
    let app = app!(Arc::new(MemoryStore::new()));

    let req = test::TestRequest::post()
        .uri("/api/v1/transactions")
        .insert_header(("x-api-key", API_KEY))
        .set_json(json!({ "transaction_id": "t1", "amount": "lots" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn test_store_outage_is_server_error() {
    let store = Arc::new(MemoryStore::new());
    let app = app!(store.clone());
    store.set_available(false);

    let resp = test::call_service(&app, post_tx("t1", 1.0).to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Internal server error");
}

#[actix_web::test]
async fn test_routes_without_base_path() {
    let http = HttpConfig {
        base_path: String::new(),
        ..HttpConfig::default()
    };
    let app = app!(Arc::new(MemoryStore::new()), http);

    let req = test::TestRequest::post()
        .uri("/transactions")
        .insert_header(("x-api-key", API_KEY))
        .set_json(tx_body("root", 5.0))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/statistics")
        .insert_header(("x-api-key", API_KEY))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["total_transactions"], 1);
}
