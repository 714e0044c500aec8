//! Tests des routes HTTP (sans réseau, via `oneshot`)

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use frequence_vivant::models::{CollectionMode, CollectionType};
use frequence_vivant::server::{build_router, AppState};
use frequence_vivant::store::CollectionStore;
use frequence_vivant::MemoryStore;

use common::{fast_config, marche, ScriptedSources};

fn app(store: MemoryStore, sources: ScriptedSources) -> (Router, AppState<MemoryStore, ScriptedSources>) {
    let state = AppState::new(store, sources, fast_config());
    (build_router(state.clone()), state)
}

async fn send(app: Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app(MemoryStore::default(), ScriptedSources::new());
    let (status, body) = send(app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_batch_endpoint() {
    let store = MemoryStore::new(vec![
        marche("Bords de Loire", Some((47.39, 0.68))),
        marche("Sans GPS", None),
    ]);
    let (app, state) = app(store, ScriptedSources::new());

    let (status, body) = send(
        app,
        Method::POST,
        "/functions/v1/batch-data-collector",
        Some(json!({ "collectionTypes": ["biodiversity", "real_estate"], "mode": "scheduled" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["marches_total"], 1);
    assert_eq!(body["summary"]["marches_processed"], 1);
    assert_eq!(body["summary"]["skipped_without_coordinates"], 1);

    let log_id: Uuid = serde_json::from_value(body["logId"].clone()).unwrap();
    let log = state.store.log(log_id).unwrap();
    assert_eq!(log.collection_mode, CollectionMode::Scheduled);
}

#[tokio::test]
async fn test_batch_endpoint_rejects_empty_types() {
    let (app, _) = app(MemoryStore::default(), ScriptedSources::new());
    let (status, body) = send(
        app,
        Method::POST,
        "/functions/v1/batch-data-collector",
        Some(json!({ "collectionTypes": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("collectionTypes"));
}

#[tokio::test]
async fn test_batch_endpoint_invalid_json() {
    let (app, _) = app(MemoryStore::default(), ScriptedSources::new());
    let (status, body) = send(
        app,
        Method::POST,
        "/functions/v1/batch-data-collector",
        Some(json!({ "collectionTypes": ["lunar"] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_batch_endpoint_fetch_failure() {
    let store = MemoryStore::default();
    store.fail_marches_fetch("relation \"marches\" does not exist");
    let (app, _) = app(store, ScriptedSources::new());

    let (status, body) = send(
        app,
        Method::POST,
        "/functions/v1/batch-data-collector",
        Some(json!({ "collectionTypes": ["weather"] })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_step_endpoint() {
    let (app, state) = app(MemoryStore::default(), ScriptedSources::new());
    let log_id = state
        .store
        .create_log(&[CollectionType::Biodiversity], CollectionMode::Manual)
        .await
        .unwrap();
    let marche_id = Uuid::new_v4();
    let payload = json!({
        "logId": log_id,
        "marcheId": marche_id,
        "latitude": 47.39,
        "longitude": 0.68,
        "marcheName": "Bords de Loire"
    });

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/functions/v1/collect-biodiversity-step",
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["speciesCount"], 3);
    assert_eq!(body["alreadyProcessed"], false);

    // Second appel: déjà traitée
    let (status, body) = send(
        app,
        Method::POST,
        "/functions/v1/collect-biodiversity-step",
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alreadyProcessed"], true);
    assert_eq!(state.sources.biodiversity_calls(), 1);
}

#[tokio::test]
async fn test_step_endpoint_exhausted() {
    let (app, state) = app(MemoryStore::default(), ScriptedSources::failing_biodiversity());
    let log_id = state
        .store
        .create_log(&[CollectionType::Biodiversity], CollectionMode::Manual)
        .await
        .unwrap();

    let (status, body) = send(
        app,
        Method::POST,
        "/functions/v1/collect-biodiversity-step",
        Some(json!({
            "logId": log_id,
            "marcheId": Uuid::new_v4(),
            "latitude": 47.39,
            "longitude": 0.68
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(state.store.log(log_id).unwrap().errors_count, 1);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = app(MemoryStore::default(), ScriptedSources::new());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/functions/v1/batch-data-collector")
        .header("origin", "https://frequence-vivant.example")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
