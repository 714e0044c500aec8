//! Serveur HTTP: expose les deux collecteurs en JSON
//!
//! Mêmes routes que les fonctions du backend, pour pouvoir remplacer
//! l'appel distant par ce binaire.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::collector::{self, BatchError, BatchRequest, StepError, StepRequest};
use crate::config::CollectorConfig;
use crate::sources::DataSources;
use crate::store::CollectionStore;

/// État partagé entre les handlers
pub struct AppState<S, D> {
    pub store: Arc<S>,
    pub sources: Arc<D>,
    pub config: Arc<CollectorConfig>,
}

impl<S, D> AppState<S, D> {
    pub fn new(store: S, sources: D, config: CollectorConfig) -> Self {
        Self {
            store: Arc::new(store),
            sources: Arc::new(sources),
            config: Arc::new(config),
        }
    }
}

// Pas de derive: S et D n'ont pas à être Clone
impl<S, D> Clone for AppState<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sources: Arc::clone(&self.sources),
            config: Arc::clone(&self.config),
        }
    }
}

/// Réponse d'erreur `{ success: false, error }`
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<BatchError> for ApiError {
    fn from(e: BatchError) -> Self {
        let status = match e {
            BatchError::NoCollectionTypes => StatusCode::BAD_REQUEST,
            BatchError::Marches(_) | BatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<StepError> for ApiError {
    fn from(e: StepError) -> Self {
        let status = match e {
            StepError::InvalidCoordinates { .. } => StatusCode::BAD_REQUEST,
            StepError::Exhausted { .. } | StepError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

/// Construit le routeur
pub fn build_router<S, D>(state: AppState<S, D>) -> Router
where
    S: CollectionStore + 'static,
    D: DataSources + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route(
            "/functions/v1/batch-data-collector",
            post(batch_handler::<S, D>),
        )
        .route(
            "/functions/v1/collect-biodiversity-step",
            post(step_handler::<S, D>),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /functions/v1/batch-data-collector
async fn batch_handler<S, D>(
    State(state): State<AppState<S, D>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: CollectionStore + 'static,
    D: DataSources + 'static,
{
    let Json(request) = payload?;

    let report = collector::run_batch(
        state.store.as_ref(),
        state.sources.as_ref(),
        &state.config,
        &request,
    )
    .await
    .map_err(|e| {
        error!(error = %e, "Batch collection failed");
        ApiError::from(e)
    })?;

    Ok(Json(json!({
        "success": true,
        "logId": report.log_id,
        "summary": report.summary_stats(),
    })))
}

/// POST /functions/v1/collect-biodiversity-step
async fn step_handler<S, D>(
    State(state): State<AppState<S, D>>,
    payload: Result<Json<StepRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: CollectionStore + 'static,
    D: DataSources + 'static,
{
    let Json(request) = payload?;

    let outcome = collector::collect_step(
        state.store.as_ref(),
        state.sources.as_ref(),
        &state.config,
        &request,
    )
    .await
    .map_err(|e| {
        error!(marche = %request.marche_id, error = %e, "Biodiversity step failed");
        ApiError::from(e)
    })?;

    Ok(Json(json!({
        "success": true,
        "marcheId": outcome.marche_id,
        "attempts": outcome.attempts,
        "speciesCount": outcome.species_count,
        "alreadyProcessed": outcome.already_processed,
    })))
}

/// Lance le serveur jusqu'à l'arrêt du process
pub async fn serve<S, D>(addr: SocketAddr, state: AppState<S, D>) -> Result<()>
where
    S: CollectionStore + 'static,
    D: DataSources + 'static,
{
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, "Server listening");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
