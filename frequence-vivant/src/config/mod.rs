//! Configuration des collecteurs

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Noms des fonctions distantes appelées pour chaque type de données
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionNames {
    pub biodiversity: String,
    pub weather: String,
    pub real_estate: String,
}

impl Default for FunctionNames {
    fn default() -> Self {
        Self {
            biodiversity: "biodiversity-data".to_string(),
            weather: "open-meteo-data".to_string(),
            real_estate: "real-estate-data".to_string(),
        }
    }
}

/// Configuration des collecteurs (fichier JSON optionnel + variables d'environnement)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// URL de base du backend (`{url}/functions/v1/{fonction}`)
    pub supabase_url: String,

    /// Clé de service envoyée en `Authorization: Bearer` et `apikey`
    #[serde(skip_serializing)]
    pub service_key: Option<String>,

    pub functions: FunctionNames,

    /// Timeout des appels HTTP (secondes)
    pub request_timeout_secs: u64,

    /// Pause entre deux marches (ms)
    pub marche_delay_ms: u64,

    /// Nombre de tentatives du collecteur par étape
    pub step_max_attempts: u32,

    /// Base du backoff linéaire entre tentatives (ms)
    pub step_backoff_ms: u64,

    /// Rayon de recherche biodiversité (m)
    pub biodiversity_radius_m: u32,

    /// Rayon de recherche immobilier (m)
    pub real_estate_radius_m: u32,

    /// Fenêtre météo en jours, jusqu'à la date du snapshot
    pub weather_days: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            service_key: None,
            functions: FunctionNames::default(),
            request_timeout_secs: 30,
            marche_delay_ms: 100,
            step_max_attempts: 3,
            step_backoff_ms: 400,
            biodiversity_radius_m: 500,
            real_estate_radius_m: 1000,
            weather_days: 7,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl CollectorConfig {
    /// Charge une configuration depuis un fichier JSON (champs absents = défauts)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse collector config JSON")
    }

    /// Défauts surchargés par l'environnement
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Applique les variables d'environnement présentes
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Ok(key) = std::env::var("SUPABASE_SERVICE_ROLE_KEY") {
            self.service_key = Some(key);
        }
        if let Ok(name) = std::env::var("BIODIVERSITY_FUNCTION") {
            self.functions.biodiversity = name;
        }
        if let Ok(name) = std::env::var("WEATHER_FUNCTION") {
            self.functions.weather = name;
        }
        if let Ok(name) = std::env::var("REAL_ESTATE_FUNCTION") {
            self.functions.real_estate = name;
        }
        if let Some(v) = env_parse("COLLECTOR_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("COLLECTOR_DELAY_MS") {
            self.marche_delay_ms = v;
        }
        if let Some(v) = env_parse("STEP_MAX_ATTEMPTS") {
            self.step_max_attempts = v;
        }
        if let Some(v) = env_parse("STEP_BACKOFF_MS") {
            self.step_backoff_ms = v;
        }
    }

    /// Charge le fichier si fourni, puis applique l'environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.supabase_url.trim().is_empty() {
            anyhow::bail!("supabase_url must not be empty");
        }
        if self.step_max_attempts == 0 {
            anyhow::bail!("step_max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn marche_delay(&self) -> Duration {
        Duration::from_millis(self.marche_delay_ms)
    }

    /// Attente après l'échec de la tentative `attempt` (1-indexée)
    pub fn step_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.step_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.marche_delay(), Duration::from_millis(100));
        assert_eq!(config.step_max_attempts, 3);
        assert_eq!(config.biodiversity_radius_m, 500);
        assert_eq!(config.real_estate_radius_m, 1000);
        assert_eq!(config.weather_days, 7);
    }

    #[test]
    fn test_backoff_is_linear() {
        let config = CollectorConfig::default();
        assert_eq!(config.step_backoff(1), Duration::from_millis(400));
        assert_eq!(config.step_backoff(2), Duration::from_millis(800));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CollectorConfig = serde_json::from_str(
            r#"{ "supabase_url": "https://x.supabase.co", "functions": { "weather": "meteo" } }"#,
        )
        .unwrap();

        assert_eq!(config.supabase_url, "https://x.supabase.co");
        assert_eq!(config.functions.weather, "meteo");
        assert_eq!(config.functions.biodiversity, "biodiversity-data");
        assert_eq!(config.step_backoff_ms, 400);
    }

    #[test]
    fn test_validate() {
        let config = CollectorConfig {
            step_max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(CollectorConfig::default().validate().is_ok());
    }
}
