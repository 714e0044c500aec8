//! # frequence-vivant
//!
//! Collecte de données environnementales pour les marches de La Fréquence
//! du Vivant (biodiversité, météo, immobilier) et export des textes.
//!
//! ## Features
//!
//! - Collecte batch sur toutes les marches, journal de progression
//! - Collecte biodiversité par étape, avec reprise et idempotence
//! - Stockage PostgreSQL avec pool de connexions
//! - Export des textes en Word, PDF ou CSV (crate `textes-export`)
//! - Serveur HTTP compatible avec les fonctions du backend
//!
//! ## Usage CLI
//!
//! ```bash
//! # Collecte batch
//! frequence-vivant collect --types biodiversity,weather --region Bretagne
//!
//! # Une marche, avec reprise
//! frequence-vivant collect-step --log-id <uuid> --marche-id <uuid> --latitude 47.39 --longitude 0.68
//!
//! # Export des textes
//! frequence-vivant export --format pdf --output ./exports/ --group-by marche
//!
//! # Serveur HTTP
//! frequence-vivant serve --port 8787
//! ```

pub mod collector;
pub mod config;
pub mod models;
pub mod report;
pub mod server;
pub mod sources;
pub mod store;

pub use collector::{collect_step, run_batch, BatchRequest, StepOutcome, StepRequest};
pub use config::CollectorConfig;
pub use report::{CollectionReport, RunStatus};
pub use sources::{DataSources, HttpSources, SourceError};
pub use store::pool::{create_pool, DatabaseConfig};
pub use store::{CollectionStore, MemoryStore, PgStore};
