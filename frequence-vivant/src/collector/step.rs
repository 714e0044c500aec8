//! Collecte biodiversité par étape: une marche par appel, avec reprise.
//!
//! Le journal partagé est mis à jour sans verrou: deux appels concurrents
//! sur le même journal peuvent se chevaucher (dernière écriture gagnante
//! sur `summary_stats`).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::{biodiversity, SnapshotContext};
use crate::config::CollectorConfig;
use crate::sources::{BiodiversityQuery, DataSources, SourceError};
use crate::store::CollectionStore;

/// Requête de collecte pour une marche
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    pub log_id: Uuid,
    pub marche_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub marche_name: Option<String>,
}

/// Résultat d'une étape réussie
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub marche_id: Uuid,
    /// Nombre d'appels à la source (0 si déjà traitée)
    pub attempts: u32,
    pub species_count: usize,
    pub already_processed: bool,
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// Toutes les tentatives ont échoué; le journal a reçu une erreur
    #[error("biodiversity collection failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: SourceError,
    },

    #[error("storage failure: {0:#}")]
    Store(anyhow::Error),
}

/// Collecte la biodiversité d'une marche et met à jour le journal
pub async fn collect_step<S, D>(
    store: &S,
    sources: &D,
    config: &CollectorConfig,
    request: &StepRequest,
) -> Result<StepOutcome, StepError>
where
    S: CollectionStore,
    D: DataSources,
{
    if !request.latitude.is_finite() || !request.longitude.is_finite() {
        return Err(StepError::InvalidCoordinates {
            latitude: request.latitude,
            longitude: request.longitude,
        });
    }

    let processed = store
        .processed_marche_ids(request.log_id)
        .await
        .map_err(StepError::Store)?;
    if processed.contains(&request.marche_id) {
        info!(log_id = %request.log_id, marche = %request.marche_id, "Marche already processed");
        return Ok(StepOutcome {
            marche_id: request.marche_id,
            attempts: 0,
            species_count: 0,
            already_processed: true,
        });
    }

    let radius = config.biodiversity_radius_m;
    let query = BiodiversityQuery::recent(request.latitude, request.longitude, radius);
    let max_attempts = config.step_max_attempts.max(1);

    let mut attempt = 0;
    let response = loop {
        attempt += 1;
        match sources.fetch_biodiversity(&query).await {
            Ok(response) => break response,
            Err(e) if attempt < max_attempts => {
                let wait = config.step_backoff(attempt);
                warn!(
                    marche = %request.marche_id,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Biodiversity call failed, retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                warn!(marche = %request.marche_id, attempts = attempt, error = %e, "Biodiversity call exhausted");
                record_error(store, request.log_id).await;
                return Err(StepError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
        }
    };

    let ctx = SnapshotContext {
        marche_id: request.marche_id,
        latitude: request.latitude,
        longitude: request.longitude,
        snapshot_date: super::today(),
    };
    let snapshot = biodiversity::to_snapshot(&ctx, radius, &response);

    if let Err(e) = store.insert_biodiversity(&snapshot).await {
        record_error(store, request.log_id).await;
        return Err(StepError::Store(e));
    }

    // snapshot déjà inséré: l'échec est compté comme une erreur du journal
    if let Err(e) = store
        .record_step_progress(request.log_id, request.marche_id)
        .await
    {
        record_error(store, request.log_id).await;
        return Err(StepError::Store(e));
    }

    info!(
        log_id = %request.log_id,
        marche = %request.marche_id,
        name = request.marche_name.as_deref().unwrap_or(""),
        attempts = attempt,
        species = response.species.len(),
        "Biodiversity step collected"
    );

    Ok(StepOutcome {
        marche_id: request.marche_id,
        attempts: attempt,
        species_count: response.species.len(),
        already_processed: false,
    })
}

/// Incrément best-effort du compteur d'erreurs
async fn record_error<S: CollectionStore>(store: &S, log_id: Uuid) {
    if let Err(e) = store.increment_log_errors(log_id).await {
        warn!(log_id = %log_id, error = %e, "Failed to increment errors count");
    }
}
