//! Collecte batch: parcourt les marches séquentiellement et insère un
//! snapshot par type demandé.
//!
//! Pas de reprise à ce niveau: un échec sur une marche compte une erreur et
//! la boucle passe à la suivante. Relancer un batch insère de nouveaux
//! snapshots (pas d'idempotence).

use std::time::Instant;

use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{biodiversity, mapping, SnapshotContext};
use crate::config::CollectorConfig;
use crate::models::{CollectionMode, CollectionType, LogProgress, Marche, MarchesFilter};
use crate::report::CollectionReport;
use crate::sources::{BiodiversityQuery, DataSources, RealEstateQuery, WeatherQuery};
use crate::store::CollectionStore;

/// Requête de collecte batch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub collection_types: Vec<CollectionType>,
    #[serde(default)]
    pub mode: CollectionMode,
    #[serde(default)]
    pub marches_filter: Option<MarchesFilter>,
}

/// Erreurs fatales d'un run batch
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("collectionTypes must not be empty")]
    NoCollectionTypes,

    /// Échec de lecture des marches: le journal est marqué `failed`
    #[error("failed to fetch marches: {0:#}")]
    Marches(anyhow::Error),

    #[error("storage failure: {0:#}")]
    Store(anyhow::Error),
}

/// Échec d'un type de collecte sur une marche
struct MarcheFailure {
    collection_type: CollectionType,
    message: String,
}

/// Lance une collecte batch et retourne le rapport final
pub async fn run_batch<S, D>(
    store: &S,
    sources: &D,
    config: &CollectorConfig,
    request: &BatchRequest,
) -> Result<CollectionReport, BatchError>
where
    S: CollectionStore,
    D: DataSources,
{
    let types = dedup_types(&request.collection_types);
    if types.is_empty() {
        return Err(BatchError::NoCollectionTypes);
    }

    let started = Instant::now();
    let log_id = store
        .create_log(&types, request.mode)
        .await
        .map_err(BatchError::Store)?;
    info!(log_id = %log_id, types = ?types, mode = request.mode.as_str(), "Batch collection started");

    let filter = request.marches_filter.clone().unwrap_or_default();
    let candidates = match store.fetch_marches(&filter).await {
        Ok(marches) => marches,
        Err(e) => {
            let message = format!("{:#}", e);
            if let Err(log_err) = store.fail_log(log_id, &message).await {
                warn!(log_id = %log_id, error = %log_err, "Failed to mark log as failed");
            }
            return Err(BatchError::Marches(e));
        }
    };

    let mut report = CollectionReport::new(log_id);
    let marches: Vec<Marche> = candidates
        .into_iter()
        .filter(|m| {
            let located = m.location().is_some();
            if !located {
                warn!(marche = %m.id, name = %m.display_name(), "Marche without coordinates skipped");
                report.skipped_without_coordinates += 1;
            }
            located
        })
        .collect();

    report.marches_total = marches.len();
    if let Err(e) = store.set_log_total(log_id, to_i32(marches.len())).await {
        warn!(log_id = %log_id, error = %e, "Failed to write marches total");
    }

    let snapshot_date = super::today();
    let total = marches.len();

    for (idx, marche) in marches.iter().enumerate() {
        match collect_marche(store, sources, config, marche, &types, snapshot_date, &mut report).await
        {
            Ok(()) => report.record_marche_success(),
            Err(failure) => {
                warn!(
                    marche = %marche.id,
                    collection_type = %failure.collection_type,
                    error = %failure.message,
                    "Marche collection failed"
                );
                report.record_marche_failure(
                    marche,
                    Some(failure.collection_type),
                    failure.message,
                );
            }
        }

        let progress = LogProgress {
            marches_processed: to_i32(report.marches_processed),
            errors_count: to_i32(report.errors_count),
            current_status: format!(
                "Marche {}/{}: {}",
                idx + 1,
                total,
                marche.display_name()
            ),
        };
        if let Err(e) = store.update_log_progress(log_id, &progress).await {
            warn!(log_id = %log_id, error = %e, "Failed to write progress");
        }

        if idx + 1 < total {
            tokio::time::sleep(config.marche_delay()).await;
        }
    }

    report.set_duration(started.elapsed());
    report.finalize();

    let progress = LogProgress {
        marches_processed: to_i32(report.marches_processed),
        errors_count: to_i32(report.errors_count),
        current_status: format!("Terminé: {}", report.summary()),
    };
    store
        .finalize_log(
            log_id,
            &progress,
            &report.summary_stats(),
            report.duration_secs.round() as i32,
        )
        .await
        .map_err(BatchError::Store)?;

    info!(
        log_id = %log_id,
        processed = report.marches_processed,
        errors = report.errors_count,
        skipped = report.skipped_without_coordinates,
        "Batch collection completed"
    );
    Ok(report)
}

/// Types dans l'ordre de la requête, sans doublon
fn dedup_types(types: &[CollectionType]) -> Vec<CollectionType> {
    let mut out = Vec::with_capacity(types.len());
    for t in types {
        if !out.contains(t) {
            out.push(*t);
        }
    }
    out
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Collecte tous les types pour une marche; s'arrête au premier échec
async fn collect_marche<S, D>(
    store: &S,
    sources: &D,
    config: &CollectorConfig,
    marche: &Marche,
    types: &[CollectionType],
    snapshot_date: NaiveDate,
    report: &mut CollectionReport,
) -> Result<(), MarcheFailure>
where
    S: CollectionStore,
    D: DataSources,
{
    let Some(point) = marche.location() else {
        return Err(MarcheFailure {
            collection_type: types[0],
            message: "missing coordinates".to_string(),
        });
    };
    let ctx = SnapshotContext {
        marche_id: marche.id,
        latitude: point.y(),
        longitude: point.x(),
        snapshot_date,
    };

    for &collection_type in types {
        let fail = |message: String| MarcheFailure {
            collection_type,
            message,
        };

        match collection_type {
            CollectionType::Biodiversity => {
                let radius = config.biodiversity_radius_m;
                let query = BiodiversityQuery::recent(ctx.latitude, ctx.longitude, radius);
                let response = sources
                    .fetch_biodiversity(&query)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                let snapshot = biodiversity::to_snapshot(&ctx, radius, &response);
                store
                    .insert_biodiversity(&snapshot)
                    .await
                    .map_err(|e| fail(format!("{:#}", e)))?;
            }
            CollectionType::Weather => {
                let query = WeatherQuery {
                    latitude: ctx.latitude,
                    longitude: ctx.longitude,
                    start_date: snapshot_date - ChronoDuration::days(i64::from(config.weather_days)),
                    end_date: snapshot_date,
                };
                let response = sources
                    .fetch_weather(&query)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                let snapshot = mapping::weather_snapshot(&ctx, &response);
                store
                    .insert_weather(&snapshot)
                    .await
                    .map_err(|e| fail(format!("{:#}", e)))?;
            }
            CollectionType::RealEstate => {
                let radius = config.real_estate_radius_m;
                let query = RealEstateQuery {
                    latitude: ctx.latitude,
                    longitude: ctx.longitude,
                    radius,
                };
                let response = sources
                    .fetch_real_estate(&query)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                let snapshot = mapping::real_estate_snapshot(&ctx, radius, &response);
                store
                    .insert_real_estate(&snapshot)
                    .await
                    .map_err(|e| fail(format!("{:#}", e)))?;
            }
        }

        report.record_snapshot(collection_type);
        debug!(marche = %marche.id, collection_type = %collection_type, "Snapshot stored");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let request: BatchRequest = serde_json::from_str(
            r#"{
                "collectionTypes": ["biodiversity", "weather"],
                "mode": "scheduled",
                "marchesFilter": { "region": "Bretagne" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            request.collection_types,
            vec![CollectionType::Biodiversity, CollectionType::Weather]
        );
        assert_eq!(request.mode, CollectionMode::Scheduled);
        assert_eq!(
            request.marches_filter.unwrap().region.as_deref(),
            Some("Bretagne")
        );
    }

    #[test]
    fn test_request_defaults() {
        let request: BatchRequest = serde_json::from_str("{}").unwrap();
        assert!(request.collection_types.is_empty());
        assert_eq!(request.mode, CollectionMode::Manual);
    }

    #[test]
    fn test_dedup_types_keeps_order() {
        let types = dedup_types(&[
            CollectionType::Weather,
            CollectionType::Biodiversity,
            CollectionType::Weather,
        ]);
        assert_eq!(types, vec![CollectionType::Weather, CollectionType::Biodiversity]);
    }
}
