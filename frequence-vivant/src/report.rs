//! Rapport de collecte
//!
//! Accumule les compteurs d'un run batch (marches traitées, erreurs,
//! snapshots par type) et produit le résumé écrit dans le journal.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{CollectionType, Marche};

/// Statut global d'un run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Toutes les marches collectées sans erreur
    Success,
    /// Certaines marches en erreur
    PartialSuccess,
    /// Aucune marche collectée
    Failed,
}

/// Échec sur une marche
#[derive(Debug, Clone, Serialize)]
pub struct MarcheError {
    pub marche_id: Uuid,
    pub marche: String,
    /// Type en cause (absent si l'échec précède les appels)
    pub collection_type: Option<CollectionType>,
    pub message: String,
}

/// Rapport complet d'un run batch
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub log_id: Uuid,
    pub status: RunStatus,
    pub duration_secs: f64,

    pub marches_total: usize,
    pub marches_processed: usize,
    pub errors_count: usize,
    pub skipped_without_coordinates: usize,

    /// Snapshots insérés par type
    pub snapshots: BTreeMap<CollectionType, usize>,

    pub errors: Vec<MarcheError>,
}

impl CollectionReport {
    pub fn new(log_id: Uuid) -> Self {
        Self {
            log_id,
            status: RunStatus::Success,
            duration_secs: 0.0,
            marches_total: 0,
            marches_processed: 0,
            errors_count: 0,
            skipped_without_coordinates: 0,
            snapshots: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Enregistre un snapshot inséré
    pub fn record_snapshot(&mut self, collection_type: CollectionType) {
        *self.snapshots.entry(collection_type).or_default() += 1;
    }

    /// Marche entièrement collectée
    pub fn record_marche_success(&mut self) {
        self.marches_processed += 1;
    }

    /// Marche en échec: une seule erreur comptée, quel que soit le nombre
    /// de types non collectés
    pub fn record_marche_failure(
        &mut self,
        marche: &Marche,
        collection_type: Option<CollectionType>,
        message: impl Into<String>,
    ) {
        self.marches_processed += 1;
        self.errors_count += 1;
        self.errors.push(MarcheError {
            marche_id: marche.id,
            marche: marche.display_name(),
            collection_type,
            message: message.into(),
        });
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Pourcentage de marches sans erreur (100 si rien à traiter)
    pub fn success_rate(&self) -> f64 {
        if self.marches_processed == 0 {
            return 100.0;
        }
        let ok = self.marches_processed - self.errors_count;
        ((ok as f64 / self.marches_processed as f64) * 10000.0).round() / 100.0
    }

    pub fn snapshot_count(&self, collection_type: CollectionType) -> usize {
        self.snapshots.get(&collection_type).copied().unwrap_or(0)
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if self.errors_count == 0 {
            RunStatus::Success
        } else if self.errors_count < self.marches_processed {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Failed
        };
    }

    /// Résumé fusionné dans `summary_stats` et renvoyé par le serveur
    pub fn summary_stats(&self) -> Value {
        let snapshots: BTreeMap<&str, usize> = self
            .snapshots
            .iter()
            .map(|(t, n)| (t.as_str(), *n))
            .collect();

        json!({
            "marches_total": self.marches_total,
            "marches_processed": self.marches_processed,
            "errors_count": self.errors_count,
            "success_rate": self.success_rate(),
            "skipped_without_coordinates": self.skipped_without_coordinates,
            "snapshots": snapshots,
            "duration_seconds": (self.duration_secs * 100.0).round() / 100.0,
        })
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("COLLECTION REPORT - Log {}", self.log_id);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Marches: {} total, {} processed, {} errors, {} skipped (no coordinates)",
            self.marches_total,
            self.marches_processed,
            self.errors_count,
            self.skipped_without_coordinates
        );
        println!("Success rate: {:.2}%", self.success_rate());

        if !self.snapshots.is_empty() {
            println!("\n--- SNAPSHOTS ---");
            for (collection_type, count) in &self.snapshots {
                println!("  {}: {}", collection_type, count);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                let kind = e
                    .collection_type
                    .map(|t| format!("[{}] ", t))
                    .unwrap_or_default();
                println!("  {}{}: {}", kind, e.marche, e.message);
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact
    pub fn summary(&self) -> String {
        format!(
            "{}/{} marches, {} errors, {:.2}% success",
            self.marches_processed,
            self.marches_total,
            self.errors_count,
            self.success_rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marche() -> Marche {
        Marche {
            id: Uuid::new_v4(),
            nom_marche: Some("Forêt".to_string()),
            ville: "Blois".to_string(),
            region: None,
            departement: None,
            latitude: Some(47.5),
            longitude: Some(1.3),
            date: None,
        }
    }

    #[test]
    fn test_new_report() {
        let report = CollectionReport::new(Uuid::nil());
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.success_rate(), 100.0);
    }

    #[test]
    fn test_failure_counts_once_per_marche() {
        let mut report = CollectionReport::new(Uuid::nil());
        report.marches_total = 3;
        report.record_snapshot(CollectionType::Weather);
        report.record_marche_success();
        report.record_marche_failure(&marche(), Some(CollectionType::Biodiversity), "timeout");
        report.record_marche_failure(&marche(), None, "insert failed");

        assert_eq!(report.marches_processed, 3);
        assert_eq!(report.errors_count, 2);
        assert_eq!(report.errors[0].marche, "Forêt (Blois)");
        assert_eq!(report.success_rate(), 33.33);
    }

    #[test]
    fn test_finalize_statuses() {
        let mut report = CollectionReport::new(Uuid::nil());
        report.record_marche_success();
        report.finalize();
        assert_eq!(report.status, RunStatus::Success);

        report.record_marche_failure(&marche(), None, "x");
        report.finalize();
        assert_eq!(report.status, RunStatus::PartialSuccess);

        let mut report = CollectionReport::new(Uuid::nil());
        report.record_marche_failure(&marche(), None, "x");
        report.finalize();
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn test_summary_stats() {
        let mut report = CollectionReport::new(Uuid::nil());
        report.marches_total = 2;
        report.skipped_without_coordinates = 1;
        report.record_snapshot(CollectionType::RealEstate);
        report.record_snapshot(CollectionType::RealEstate);
        report.record_marche_success();
        report.record_marche_success();
        report.set_duration(Duration::from_millis(1234));

        let stats = report.summary_stats();
        assert_eq!(stats["marches_processed"], 2);
        assert_eq!(stats["success_rate"], 100.0);
        assert_eq!(stats["snapshots"]["real_estate"], 2);
        assert_eq!(stats["skipped_without_coordinates"], 1);
        assert_eq!(stats["duration_seconds"], 1.23);
    }

    #[test]
    fn test_summary() {
        let mut report = CollectionReport::new(Uuid::nil());
        report.marches_total = 4;
        report.record_marche_success();
        assert_eq!(report.summary(), "1/4 marches, 0 errors, 100.00% success");
    }
}
