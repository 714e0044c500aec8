//! Persistance des marches, snapshots et journaux de collecte
//!
//! Aucun couplage transactionnel entre l'insertion des snapshots et la mise
//! à jour du journal: un arrêt en cours de boucle laisse des données
//! partielles, le dernier compteur du journal faisant foi.

pub mod memory;
pub mod pool;
pub mod postgres;

use std::future::Future;

use anyhow::Result;
use uuid::Uuid;

use crate::models::{
    BiodiversitySnapshot, CollectionMode, CollectionType, LogProgress, Marche, MarchesFilter,
    RealEstateSnapshot, WeatherSnapshot,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Stockage utilisé par les collecteurs.
///
/// Les futures sont `Send` pour pouvoir être utilisées depuis les handlers HTTP.
pub trait CollectionStore: Send + Sync {
    /// Marches candidates correspondant au filtre
    fn fetch_marches(
        &self,
        filter: &MarchesFilter,
    ) -> impl Future<Output = Result<Vec<Marche>>> + Send;

    /// Crée un journal `running` et retourne son identifiant
    fn create_log(
        &self,
        types: &[CollectionType],
        mode: CollectionMode,
    ) -> impl Future<Output = Result<Uuid>> + Send;

    fn set_log_total(&self, log_id: Uuid, total: i32) -> impl Future<Output = Result<()>> + Send;

    /// Compteurs et `summary_stats.current_status`
    fn update_log_progress(
        &self,
        log_id: Uuid,
        progress: &LogProgress,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Statut `completed`, durée et résumé fusionné dans `summary_stats`
    fn finalize_log(
        &self,
        log_id: Uuid,
        progress: &LogProgress,
        summary: &serde_json::Value,
        duration_seconds: i32,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Statut `failed` avec le message d'erreur
    fn fail_log(&self, log_id: Uuid, message: &str) -> impl Future<Output = Result<()>> + Send;

    /// `errors_count += 1`
    fn increment_log_errors(&self, log_id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// Contenu de `summary_stats.processed_marche_ids`
    fn processed_marche_ids(&self, log_id: Uuid) -> impl Future<Output = Result<Vec<Uuid>>> + Send;

    /// `marches_processed += 1` et ajout de la marche à `processed_marche_ids`
    fn record_step_progress(
        &self,
        log_id: Uuid,
        marche_id: Uuid,
    ) -> impl Future<Output = Result<()>> + Send;

    fn insert_biodiversity(
        &self,
        snapshot: &BiodiversitySnapshot,
    ) -> impl Future<Output = Result<()>> + Send;

    fn insert_weather(&self, snapshot: &WeatherSnapshot) -> impl Future<Output = Result<()>> + Send;

    fn insert_real_estate(
        &self,
        snapshot: &RealEstateSnapshot,
    ) -> impl Future<Output = Result<()>> + Send;
}
