//! Appels HTTP aux fonctions distantes (`{url}/functions/v1/{fonction}`)

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{
    BiodiversityQuery, BiodiversityResponse, DataSources, RealEstateQuery, RealEstateResponse,
    SourceError, WeatherQuery, WeatherResponse,
};
use crate::config::CollectorConfig;

const MAX_ERROR_BODY: usize = 300;

/// Client des fonctions distantes
#[derive(Debug, Clone)]
pub struct HttpSources {
    client: reqwest::Client,
    base_url: String,
    service_key: Option<String>,
    biodiversity_fn: String,
    weather_fn: String,
    real_estate_fn: String,
}

impl HttpSources {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("frequence-vivant/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            biodiversity_fn: config.functions.biodiversity.clone(),
            weather_fn: config.functions.weather.clone(),
            real_estate_fn: config.functions.real_estate.clone(),
        })
    }

    pub fn function_url(&self, function: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, function)
    }

    async fn call<Q: Serialize, R: DeserializeOwned>(
        &self,
        function: &str,
        body: &Q,
    ) -> Result<R, SourceError> {
        let url = self.function_url(function);
        debug!(function, url = %url, "Calling data function");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.service_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request.send().await.map_err(|e| SourceError::Transport {
            function: function.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate(&mut body, MAX_ERROR_BODY);
            return Err(SourceError::Status {
                function: function.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await.map_err(|e| SourceError::Decode {
            function: function.to_string(),
            reason: e.to_string(),
        })?;

        decode_payload(function, value)
    }
}

/// Décode la réponse d'une fonction: corps direct ou enveloppe
/// `{ success, data, error }`.
pub fn decode_payload<R: DeserializeOwned>(function: &str, value: Value) -> Result<R, SourceError> {
    let value = match value {
        Value::Null => {
            return Err(SourceError::Empty {
                function: function.to_string(),
            })
        }
        Value::Object(mut map) if map.contains_key("success") => {
            if map.get("success") == Some(&Value::Bool(false)) {
                let message = map
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(SourceError::Upstream {
                    function: function.to_string(),
                    message,
                });
            }
            match map.remove("data") {
                Some(Value::Null) => {
                    return Err(SourceError::Empty {
                        function: function.to_string(),
                    })
                }
                Some(data) => data,
                None => Value::Object(map),
            }
        }
        other => other,
    };

    serde_json::from_value(value).map_err(|e| SourceError::Decode {
        function: function.to_string(),
        reason: e.to_string(),
    })
}

fn truncate(s: &mut String, max: usize) {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
}

impl DataSources for HttpSources {
    async fn fetch_biodiversity(
        &self,
        query: &BiodiversityQuery,
    ) -> Result<BiodiversityResponse, SourceError> {
        self.call(&self.biodiversity_fn, query).await
    }

    async fn fetch_weather(&self, query: &WeatherQuery) -> Result<WeatherResponse, SourceError> {
        self.call(&self.weather_fn, query).await
    }

    async fn fetch_real_estate(
        &self,
        query: &RealEstateQuery,
    ) -> Result<RealEstateResponse, SourceError> {
        self.call(&self.real_estate_fn, query).await
    }
}
