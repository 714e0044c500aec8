//! Modèle de données: marches, types de collecte, snapshots et journal

use chrono::{DateTime, NaiveDate, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Une marche: lieu de promenade, clé de toutes les collectes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Marche {
    pub id: Uuid,
    #[serde(default)]
    pub nom_marche: Option<String>,
    #[serde(default)]
    pub ville: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub departement: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl Marche {
    /// Position (x = longitude, y = latitude), seulement si les deux
    /// coordonnées sont présentes et finies
    pub fn location(&self) -> Option<Point<f64>> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => {
                Some(Point::new(lon, lat))
            }
            _ => None,
        }
    }

    /// Nom affiché dans le statut de progression
    pub fn display_name(&self) -> String {
        match self.nom_marche.as_deref().map(str::trim) {
            Some(nom) if !nom.is_empty() => format!("{} ({})", nom, self.ville),
            _ => self.ville.clone(),
        }
    }
}

/// Type de données collectées
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    Biodiversity,
    Weather,
    RealEstate,
}

impl CollectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionType::Biodiversity => "biodiversity",
            CollectionType::Weather => "weather",
            CollectionType::RealEstate => "real_estate",
        }
    }
}

impl std::fmt::Display for CollectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CollectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "biodiversity" | "biodiversite" => Ok(CollectionType::Biodiversity),
            "weather" | "meteo" => Ok(CollectionType::Weather),
            "real_estate" | "realestate" | "immobilier" => Ok(CollectionType::RealEstate),
            _ => Err(format!(
                "Invalid collection type: {}. Use: biodiversity, weather, real_estate",
                s
            )),
        }
    }
}

/// Mode de déclenchement d'une collecte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    Scheduled,
    #[default]
    Manual,
}

impl CollectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionMode::Scheduled => "scheduled",
            CollectionMode::Manual => "manual",
        }
    }
}

impl std::str::FromStr for CollectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" | "cron" => Ok(CollectionMode::Scheduled),
            "manual" => Ok(CollectionMode::Manual),
            _ => Err(format!("Invalid mode: {}. Use: scheduled, manual", s)),
        }
    }
}

/// Filtre de sélection des marches
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarchesFilter {
    #[serde(default)]
    pub ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub departement: Option<String>,
}

impl MarchesFilter {
    pub fn matches(&self, marche: &Marche) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&marche.id) {
                return false;
            }
        }
        if let Some(region) = &self.region {
            if marche.region.as_deref() != Some(region.as_str()) {
                return false;
            }
        }
        if let Some(dep) = &self.departement {
            if marche.departement.as_deref() != Some(dep.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Statut d'un journal de collecte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Running,
    Completed,
    Failed,
}

/// Journal de progression partagé (table `data_collection_logs`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataCollectionLog {
    pub id: Uuid,
    pub collection_type: String,
    pub collection_mode: CollectionMode,
    pub status: LogStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub marches_total: i32,
    pub marches_processed: i32,
    pub errors_count: i32,
    pub summary_stats: serde_json::Value,
    pub duration_seconds: Option<i32>,
}

/// Mise à jour de progression écrite après chaque marche
#[derive(Debug, Clone, PartialEq)]
pub struct LogProgress {
    pub marches_processed: i32,
    pub errors_count: i32,
    pub current_status: String,
}

/// Snapshot biodiversité (table `biodiversity_snapshots`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiodiversitySnapshot {
    pub marche_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: i32,
    pub snapshot_date: NaiveDate,
    pub total_species: i32,
    pub birds_count: i32,
    pub plants_count: i32,
    pub fungi_count: i32,
    pub others_count: i32,
    pub recent_observations: i32,
    pub biodiversity_index: Option<f64>,
    pub species_data: serde_json::Value,
    pub methodology: serde_json::Value,
}

/// Snapshot météo (table `weather_snapshots`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub marche_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub snapshot_date: NaiveDate,
    pub temperature_avg: Option<f64>,
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub humidity_avg: Option<f64>,
    pub precipitation_total: Option<f64>,
    pub wind_speed_avg: Option<f64>,
    pub sunshine_hours: Option<f64>,
    pub raw_data: serde_json::Value,
}

/// Snapshot immobilier (table `real_estate_snapshots`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealEstateSnapshot {
    pub marche_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: i32,
    pub snapshot_date: NaiveDate,
    pub transactions_count: i32,
    pub avg_price_m2: Option<f64>,
    pub median_price_m2: Option<f64>,
    pub total_volume: f64,
    pub property_types: serde_json::Value,
    pub raw_data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marche(lat: Option<f64>, lon: Option<f64>) -> Marche {
        Marche {
            id: Uuid::new_v4(),
            nom_marche: Some("Bords de Loire".to_string()),
            ville: "Tours".to_string(),
            region: Some("Centre-Val de Loire".to_string()),
            departement: Some("37".to_string()),
            latitude: lat,
            longitude: lon,
            date: None,
        }
    }

    #[test]
    fn test_location_requires_both_coordinates() {
        let m = marche(Some(47.39), Some(0.68));
        let p = m.location().unwrap();
        assert_eq!(p.x(), 0.68);
        assert_eq!(p.y(), 47.39);

        assert!(marche(Some(47.39), None).location().is_none());
        assert!(marche(None, Some(0.68)).location().is_none());
        assert!(marche(Some(f64::NAN), Some(0.68)).location().is_none());
    }

    #[test]
    fn test_display_name() {
        let mut m = marche(None, None);
        assert_eq!(m.display_name(), "Bords de Loire (Tours)");
        m.nom_marche = Some("  ".to_string());
        assert_eq!(m.display_name(), "Tours");
    }

    #[test]
    fn test_collection_type_parsing() {
        assert_eq!(
            "real-estate".parse::<CollectionType>().unwrap(),
            CollectionType::RealEstate
        );
        assert_eq!(
            "Biodiversity".parse::<CollectionType>().unwrap(),
            CollectionType::Biodiversity
        );
        assert!("traffic".parse::<CollectionType>().is_err());

        let parsed: Vec<CollectionType> =
            serde_json::from_str(r#"["weather","real_estate"]"#).unwrap();
        assert_eq!(parsed, vec![CollectionType::Weather, CollectionType::RealEstate]);
    }

    #[test]
    fn test_filter_matches() {
        let m = marche(None, None);
        assert!(MarchesFilter::default().matches(&m));
        assert!(MarchesFilter {
            departement: Some("37".to_string()),
            ..Default::default()
        }
        .matches(&m));
        assert!(!MarchesFilter {
            ids: Some(vec![Uuid::new_v4()]),
            ..Default::default()
        }
        .matches(&m));
        assert!(!MarchesFilter {
            region: Some("Bretagne".to_string()),
            ..Default::default()
        }
        .matches(&m));
    }
}
