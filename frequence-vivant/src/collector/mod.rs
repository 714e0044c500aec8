//! Collecteurs de données: batch (toutes les marches) et par étape (une marche)

pub mod batch;
pub mod biodiversity;
pub mod mapping;
pub mod step;

use chrono::NaiveDate;
use uuid::Uuid;

pub use batch::{run_batch, BatchError, BatchRequest};
pub use step::{collect_step, StepError, StepOutcome, StepRequest};

/// Contexte commun à tous les snapshots d'une marche
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotContext {
    pub marche_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub snapshot_date: NaiveDate,
}

/// Date des snapshots: jour courant (UTC)
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
