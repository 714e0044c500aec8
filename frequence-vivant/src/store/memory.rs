//! Stockage en mémoire: mode `--dry-run` et tests

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::CollectionStore;
use crate::models::{
    BiodiversitySnapshot, CollectionMode, CollectionType, DataCollectionLog, LogProgress,
    LogStatus, Marche, MarchesFilter, RealEstateSnapshot, WeatherSnapshot,
};

#[derive(Debug, Default)]
struct Inner {
    marches: Vec<Marche>,
    logs: HashMap<Uuid, DataCollectionLog>,
    biodiversity: Vec<BiodiversitySnapshot>,
    weather: Vec<WeatherSnapshot>,
    real_estate: Vec<RealEstateSnapshot>,
    failing_inserts: HashSet<Uuid>,
    fail_fetch: Option<String>,
    fail_step_progress: bool,
}

/// Stockage en mémoire, mêmes sémantiques que [`super::PgStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(marches: Vec<Marche>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                marches,
                ..Default::default()
            }),
        }
    }

    /// Charge les marches depuis un fichier JSON (tableau)
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read marches file {}: {}", path.display(), e))?;
        let marches: Vec<Marche> = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse marches file {}: {}", path.display(), e))?;
        Ok(Self::new(marches))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Un panic pendant un test ne doit pas empoisonner les suivants
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Les insertions pour cette marche échoueront
    pub fn fail_inserts_for(&self, marche_id: Uuid) {
        self.lock().failing_inserts.insert(marche_id);
    }

    /// `fetch_marches` échouera avec ce message
    pub fn fail_marches_fetch(&self, message: &str) {
        self.lock().fail_fetch = Some(message.to_string());
    }

    /// `record_step_progress` échouera
    pub fn fail_step_progress(&self) {
        self.lock().fail_step_progress = true;
    }

    /// Tous les journaux, du plus ancien au plus récent
    pub fn logs(&self) -> Vec<DataCollectionLog> {
        let mut logs: Vec<_> = self.lock().logs.values().cloned().collect();
        logs.sort_by_key(|log| log.started_at);
        logs
    }

    pub fn log(&self, log_id: Uuid) -> Option<DataCollectionLog> {
        self.lock().logs.get(&log_id).cloned()
    }

    pub fn biodiversity_snapshots(&self) -> Vec<BiodiversitySnapshot> {
        self.lock().biodiversity.clone()
    }

    pub fn weather_snapshots(&self) -> Vec<WeatherSnapshot> {
        self.lock().weather.clone()
    }

    pub fn real_estate_snapshots(&self) -> Vec<RealEstateSnapshot> {
        self.lock().real_estate.clone()
    }

    fn with_log<T>(&self, log_id: Uuid, f: impl FnOnce(&mut DataCollectionLog) -> T) -> Result<T> {
        let mut inner = self.lock();
        let log = inner
            .logs
            .get_mut(&log_id)
            .ok_or_else(|| anyhow!("Collection log {} not found", log_id))?;
        Ok(f(log))
    }

    fn check_insert(&self, marche_id: Uuid) -> Result<()> {
        if self.lock().failing_inserts.contains(&marche_id) {
            bail!("insert rejected for marche {}", marche_id);
        }
        Ok(())
    }
}

fn merge_summary(target: &mut Value, patch: &Value) {
    if !target.is_object() {
        *target = json!({});
    }
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
}

impl CollectionStore for MemoryStore {
    async fn fetch_marches(&self, filter: &MarchesFilter) -> Result<Vec<Marche>> {
        let inner = self.lock();
        if let Some(message) = &inner.fail_fetch {
            bail!("{}", message);
        }
        Ok(inner
            .marches
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    async fn create_log(&self, types: &[CollectionType], mode: CollectionMode) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let log = DataCollectionLog {
            id,
            collection_type: types
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(","),
            collection_mode: mode,
            status: LogStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            marches_total: 0,
            marches_processed: 0,
            errors_count: 0,
            summary_stats: json!({}),
            duration_seconds: None,
        };
        self.lock().logs.insert(id, log);
        Ok(id)
    }

    async fn set_log_total(&self, log_id: Uuid, total: i32) -> Result<()> {
        self.with_log(log_id, |log| log.marches_total = total)
    }

    async fn update_log_progress(&self, log_id: Uuid, progress: &LogProgress) -> Result<()> {
        self.with_log(log_id, |log| {
            log.marches_processed = progress.marches_processed;
            log.errors_count = progress.errors_count;
            merge_summary(
                &mut log.summary_stats,
                &json!({ "current_status": progress.current_status }),
            );
        })
    }

    async fn finalize_log(
        &self,
        log_id: Uuid,
        progress: &LogProgress,
        summary: &Value,
        duration_seconds: i32,
    ) -> Result<()> {
        self.with_log(log_id, |log| {
            log.status = LogStatus::Completed;
            log.completed_at = Some(Utc::now());
            log.duration_seconds = Some(duration_seconds);
            log.marches_processed = progress.marches_processed;
            log.errors_count = progress.errors_count;
            merge_summary(&mut log.summary_stats, summary);
            merge_summary(
                &mut log.summary_stats,
                &json!({ "current_status": progress.current_status }),
            );
        })
    }

    async fn fail_log(&self, log_id: Uuid, message: &str) -> Result<()> {
        self.with_log(log_id, |log| {
            log.status = LogStatus::Failed;
            log.completed_at = Some(Utc::now());
            merge_summary(&mut log.summary_stats, &json!({ "error": message }));
        })
    }

    async fn increment_log_errors(&self, log_id: Uuid) -> Result<()> {
        self.with_log(log_id, |log| log.errors_count += 1)
    }

    async fn processed_marche_ids(&self, log_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_log(log_id, |log| {
            log.summary_stats
                .get("processed_marche_ids")
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter_map(Value::as_str)
                        .filter_map(|s| Uuid::parse_str(s).ok())
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    async fn record_step_progress(&self, log_id: Uuid, marche_id: Uuid) -> Result<()> {
        if self.lock().fail_step_progress {
            bail!("progress update rejected for log {}", log_id);
        }
        self.with_log(log_id, |log| {
            log.marches_processed += 1;
            if !log.summary_stats.is_object() {
                log.summary_stats = json!({});
            }
            if let Some(stats) = log.summary_stats.as_object_mut() {
                let ids = stats
                    .entry("processed_marche_ids")
                    .or_insert_with(|| json!([]));
                if let Some(ids) = ids.as_array_mut() {
                    ids.push(Value::String(marche_id.to_string()));
                }
            }
        })
    }

    async fn insert_biodiversity(&self, snapshot: &BiodiversitySnapshot) -> Result<()> {
        self.check_insert(snapshot.marche_id)?;
        self.lock().biodiversity.push(snapshot.clone());
        Ok(())
    }

    async fn insert_weather(&self, snapshot: &WeatherSnapshot) -> Result<()> {
        self.check_insert(snapshot.marche_id)?;
        self.lock().weather.push(snapshot.clone());
        Ok(())
    }

    async fn insert_real_estate(&self, snapshot: &RealEstateSnapshot) -> Result<()> {
        self.check_insert(snapshot.marche_id)?;
        self.lock().real_estate.push(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_step_progress_appends_ids() {
        let store = MemoryStore::default();
        let log_id = store
            .create_log(&[CollectionType::Biodiversity], CollectionMode::Manual)
            .await
            .unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.record_step_progress(log_id, a).await.unwrap();
        store.record_step_progress(log_id, b).await.unwrap();

        assert_eq!(store.processed_marche_ids(log_id).await.unwrap(), vec![a, b]);
        assert_eq!(store.log(log_id).unwrap().marches_processed, 2);
    }

    #[tokio::test]
    async fn test_unknown_log_is_an_error() {
        let store = MemoryStore::default();
        assert!(store.increment_log_errors(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_finalize_merges_summary() {
        let store = MemoryStore::default();
        let log_id = store
            .create_log(
                &[CollectionType::Weather, CollectionType::RealEstate],
                CollectionMode::Scheduled,
            )
            .await
            .unwrap();
        let progress = LogProgress {
            marches_processed: 3,
            errors_count: 1,
            current_status: "Terminé".to_string(),
        };

        store
            .finalize_log(log_id, &progress, &json!({ "success_rate": 66.67 }), 4)
            .await
            .unwrap();

        let log = store.log(log_id).unwrap();
        assert_eq!(log.collection_type, "weather,real_estate");
        assert_eq!(log.status, LogStatus::Completed);
        assert_eq!(log.summary_stats["success_rate"], 66.67);
        assert_eq!(log.summary_stats["current_status"], "Terminé");
        assert_eq!(log.duration_seconds, Some(4));
    }
}
