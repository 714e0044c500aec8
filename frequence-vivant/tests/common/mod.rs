//! Sources scriptées et données de test partagées

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use frequence_vivant::config::CollectorConfig;
use frequence_vivant::models::Marche;
use frequence_vivant::sources::{
    BiodiversityQuery, BiodiversityResponse, DailyWeather, DataSources, RealEstateQuery,
    RealEstateResponse, SourceError, SpeciesObservation, Transaction, WeatherQuery,
    WeatherResponse,
};

/// Sources en mémoire: réponses fixes, échecs programmables
#[derive(Default)]
pub struct ScriptedSources {
    /// Résultats biodiversité consommés dans l'ordre, puis réponse par défaut
    biodiversity_script: Mutex<VecDeque<Result<BiodiversityResponse, SourceError>>>,
    /// Latitudes pour lesquelles la météo échoue
    failing_weather: Mutex<HashSet<u64>>,
    biodiversity_always_fails: bool,
    pub biodiversity_calls: AtomicUsize,
    pub weather_calls: AtomicUsize,
    pub real_estate_calls: AtomicUsize,
}

impl ScriptedSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toutes les requêtes biodiversité échouent
    pub fn failing_biodiversity() -> Self {
        Self {
            biodiversity_always_fails: true,
            ..Self::default()
        }
    }

    pub fn push_biodiversity(&self, result: Result<BiodiversityResponse, SourceError>) {
        lock(&self.biodiversity_script).push_back(result);
    }

    pub fn fail_weather_at(&self, latitude: f64) {
        lock(&self.failing_weather).insert(latitude.to_bits());
    }

    pub fn biodiversity_calls(&self) -> usize {
        self.biodiversity_calls.load(Ordering::SeqCst)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn upstream_error(function: &str) -> SourceError {
    SourceError::Upstream {
        function: function.to_string(),
        message: "service unavailable".to_string(),
    }
}

pub fn species_response() -> BiodiversityResponse {
    BiodiversityResponse {
        species: vec![
            SpeciesObservation {
                scientific_name: "Erithacus rubecula".into(),
                common_name: Some("Rougegorge familier".into()),
                kingdom: Some("Animalia".into()),
                class: Some("Aves".into()),
                observations: 4,
                ..Default::default()
            },
            SpeciesObservation {
                scientific_name: "Quercus robur".into(),
                common_name: Some("Chêne pédonculé".into()),
                kingdom: Some("Plantae".into()),
                observations: 2,
                ..Default::default()
            },
            SpeciesObservation {
                scientific_name: "Amanita muscaria".into(),
                kingdom: Some("Fungi".into()),
                observations: 1,
                ..Default::default()
            },
        ],
        summary: None,
        methodology: None,
    }
}

impl DataSources for ScriptedSources {
    async fn fetch_biodiversity(
        &self,
        _query: &BiodiversityQuery,
    ) -> Result<BiodiversityResponse, SourceError> {
        self.biodiversity_calls.fetch_add(1, Ordering::SeqCst);
        if self.biodiversity_always_fails {
            return Err(upstream_error("biodiversity-data"));
        }
        let scripted = lock(&self.biodiversity_script).pop_front();
        scripted.unwrap_or_else(|| Ok(species_response()))
    }

    async fn fetch_weather(&self, query: &WeatherQuery) -> Result<WeatherResponse, SourceError> {
        self.weather_calls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failing_weather).contains(&query.latitude.to_bits()) {
            return Err(upstream_error("open-meteo-data"));
        }
        Ok(WeatherResponse {
            latitude: Some(query.latitude),
            longitude: Some(query.longitude),
            timezone: Some("Europe/Paris".into()),
            daily: Some(DailyWeather {
                time: vec!["2024-05-01".into(), "2024-05-02".into()],
                temperature_2m_mean: Some(vec![Some(12.0), Some(14.0)]),
                temperature_2m_max: Some(vec![Some(16.0), Some(19.0)]),
                temperature_2m_min: Some(vec![Some(8.0), Some(9.5)]),
                precipitation_sum: Some(vec![Some(1.2), Some(0.0)]),
                ..Default::default()
            }),
        })
    }

    async fn fetch_real_estate(
        &self,
        _query: &RealEstateQuery,
    ) -> Result<RealEstateResponse, SourceError> {
        self.real_estate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RealEstateResponse {
            transactions: vec![Transaction {
                date_mutation: Some("2023-11-14".into()),
                valeur_fonciere: Some(180_000.0),
                surface_reelle_bati: Some(90.0),
                type_local: Some("Maison".into()),
                commune: Some("Tours".into()),
            }],
        })
    }
}

pub fn marche(nom: &str, coords: Option<(f64, f64)>) -> Marche {
    Marche {
        id: Uuid::new_v4(),
        nom_marche: Some(nom.to_string()),
        ville: "Tours".to_string(),
        region: Some("Centre-Val de Loire".to_string()),
        departement: Some("37".to_string()),
        latitude: coords.map(|c| c.0),
        longitude: coords.map(|c| c.1),
        date: None,
    }
}

/// Configuration sans attente entre marches ni entre tentatives
pub fn fast_config() -> CollectorConfig {
    CollectorConfig {
        marche_delay_ms: 0,
        step_backoff_ms: 1,
        ..CollectorConfig::default()
    }
}
