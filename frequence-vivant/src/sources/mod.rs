//! Sources de données externes (fonctions distantes biodiversité, météo, immobilier)

pub mod http;

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpSources;

/// Erreurs d'appel à une source externe
#[derive(Debug, Error)]
pub enum SourceError {
    /// Échec réseau (connexion, timeout)
    #[error("{function}: transport error: {source}")]
    Transport {
        function: String,
        #[source]
        source: reqwest::Error,
    },

    /// Réponse HTTP non 2xx
    #[error("{function}: HTTP {status}: {body}")]
    Status {
        function: String,
        status: u16,
        body: String,
    },

    /// La fonction a répondu `success: false`
    #[error("{function}: upstream error: {message}")]
    Upstream { function: String, message: String },

    /// Corps illisible
    #[error("{function}: invalid payload: {reason}")]
    Decode { function: String, reason: String },

    /// Corps vide (`null`)
    #[error("{function}: empty payload")]
    Empty { function: String },
}

/// Requête biodiversité
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiodiversityQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: u32,
    pub date_filter: String,
}

impl BiodiversityQuery {
    pub fn recent(latitude: f64, longitude: f64, radius: u32) -> Self {
        Self {
            latitude,
            longitude,
            radius,
            date_filter: "recent".to_string(),
        }
    }
}

/// Requête météo (fenêtre de dates incluse)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Requête immobilier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealEstateQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: u32,
}

/// Espèce observée
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesObservation {
    #[serde(default, alias = "scientific_name")]
    pub scientific_name: String,
    #[serde(default, alias = "common_name")]
    pub common_name: Option<String>,
    #[serde(default)]
    pub kingdom: Option<String>,
    #[serde(default, alias = "class_name")]
    pub class: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default = "one", alias = "observation_count", alias = "count")]
    pub observations: u32,
    #[serde(default, alias = "last_seen")]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

fn one() -> u32 {
    1
}

/// Résumé calculé par la source (absent chez certaines sources)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BiodiversitySummary {
    #[serde(alias = "total_species")]
    pub total_species: u32,
    pub birds: u32,
    pub plants: u32,
    pub fungi: u32,
    pub others: u32,
    #[serde(alias = "recent_observations")]
    pub recent_observations: u32,
}

/// Réponse de la fonction biodiversité
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BiodiversityResponse {
    pub species: Vec<SpeciesObservation>,
    pub summary: Option<BiodiversitySummary>,
    pub methodology: Option<serde_json::Value>,
}

/// Séries journalières Open-Meteo (valeurs manquantes possibles)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DailyWeather {
    pub time: Vec<String>,
    pub temperature_2m_mean: Option<Vec<Option<f64>>>,
    pub temperature_2m_max: Option<Vec<Option<f64>>>,
    pub temperature_2m_min: Option<Vec<Option<f64>>>,
    pub relative_humidity_2m_mean: Option<Vec<Option<f64>>>,
    pub precipitation_sum: Option<Vec<Option<f64>>>,
    pub wind_speed_10m_mean: Option<Vec<Option<f64>>>,
    /// Durée d'ensoleillement en secondes
    pub sunshine_duration: Option<Vec<Option<f64>>>,
}

/// Réponse de la fonction météo
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub daily: Option<DailyWeather>,
}

/// Transaction immobilière (DVF)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Transaction {
    #[serde(alias = "date")]
    pub date_mutation: Option<String>,
    #[serde(alias = "price", alias = "valeurFonciere")]
    pub valeur_fonciere: Option<f64>,
    #[serde(alias = "surface", alias = "surfaceReelleBati")]
    pub surface_reelle_bati: Option<f64>,
    #[serde(alias = "type", alias = "typeLocal")]
    pub type_local: Option<String>,
    pub commune: Option<String>,
}

/// Réponse de la fonction immobilier
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RealEstateResponse {
    #[serde(alias = "mutations")]
    pub transactions: Vec<Transaction>,
}

/// Accès aux sources externes.
///
/// Les futures sont `Send` pour pouvoir être utilisées depuis les handlers HTTP.
pub trait DataSources: Send + Sync {
    fn fetch_biodiversity(
        &self,
        query: &BiodiversityQuery,
    ) -> impl Future<Output = Result<BiodiversityResponse, SourceError>> + Send;

    fn fetch_weather(
        &self,
        query: &WeatherQuery,
    ) -> impl Future<Output = Result<WeatherResponse, SourceError>> + Send;

    fn fetch_real_estate(
        &self,
        query: &RealEstateQuery,
    ) -> impl Future<Output = Result<RealEstateResponse, SourceError>> + Send;
}
