//! Conversion des réponses météo et immobilier en snapshots

use std::collections::BTreeMap;

use super::SnapshotContext;
use crate::models::{RealEstateSnapshot, WeatherSnapshot};
use crate::sources::{RealEstateResponse, WeatherResponse};

const SECONDS_PER_HOUR: f64 = 3600.0;

fn values(series: &Option<Vec<Option<f64>>>) -> Vec<f64> {
    series
        .as_deref()
        .unwrap_or_default()
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn sum(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum())
}

fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Agrégats journaliers Open-Meteo.
///
/// Température moyenne: série `mean`, sinon (max + min) / 2 jour par jour.
pub fn weather_snapshot(ctx: &SnapshotContext, response: &WeatherResponse) -> WeatherSnapshot {
    let daily = response.daily.clone().unwrap_or_default();

    let maxs = values(&daily.temperature_2m_max);
    let mins = values(&daily.temperature_2m_min);
    let mut means = values(&daily.temperature_2m_mean);
    if means.is_empty() {
        let highs = daily.temperature_2m_max.as_deref().unwrap_or_default();
        let lows = daily.temperature_2m_min.as_deref().unwrap_or_default();
        means = highs
            .iter()
            .zip(lows)
            .filter_map(|(h, l)| match (h, l) {
                (Some(h), Some(l)) if h.is_finite() && l.is_finite() => Some((h + l) / 2.0),
                _ => None,
            })
            .collect();
    }

    WeatherSnapshot {
        marche_id: ctx.marche_id,
        latitude: ctx.latitude,
        longitude: ctx.longitude,
        snapshot_date: ctx.snapshot_date,
        temperature_avg: mean(&means).map(round2),
        temperature_min: min(&mins),
        temperature_max: max(&maxs),
        humidity_avg: mean(&values(&daily.relative_humidity_2m_mean)).map(round2),
        precipitation_total: sum(&values(&daily.precipitation_sum)).map(round2),
        wind_speed_avg: mean(&values(&daily.wind_speed_10m_mean)).map(round2),
        sunshine_hours: sum(&values(&daily.sunshine_duration)).map(|s| round2(s / SECONDS_PER_HOUR)),
        raw_data: serde_json::to_value(response).unwrap_or_default(),
    }
}

/// Agrégats des transactions: prix au m² sur les transactions avec prix et
/// surface strictement positifs
pub fn real_estate_snapshot(
    ctx: &SnapshotContext,
    radius_meters: u32,
    response: &RealEstateResponse,
) -> RealEstateSnapshot {
    let mut prices_m2: Vec<f64> = response
        .transactions
        .iter()
        .filter_map(|t| match (t.valeur_fonciere, t.surface_reelle_bati) {
            (Some(price), Some(surface)) if price > 0.0 && surface > 0.0 => Some(price / surface),
            _ => None,
        })
        .collect();

    let total_volume: f64 = response
        .transactions
        .iter()
        .filter_map(|t| t.valeur_fonciere)
        .filter(|v| *v > 0.0)
        .sum();

    let mut property_types: BTreeMap<String, u32> = BTreeMap::new();
    for t in &response.transactions {
        let key = match t.type_local.as_deref().map(str::trim) {
            Some(kind) if !kind.is_empty() => kind.to_string(),
            _ => "Inconnu".to_string(),
        };
        *property_types.entry(key).or_default() += 1;
    }

    RealEstateSnapshot {
        marche_id: ctx.marche_id,
        latitude: ctx.latitude,
        longitude: ctx.longitude,
        radius_meters: i32::try_from(radius_meters).unwrap_or(i32::MAX),
        snapshot_date: ctx.snapshot_date,
        transactions_count: i32::try_from(response.transactions.len()).unwrap_or(i32::MAX),
        avg_price_m2: mean(&prices_m2).map(round2),
        median_price_m2: median(&mut prices_m2).map(round2),
        total_volume: round2(total_volume),
        property_types: serde_json::to_value(&property_types).unwrap_or_default(),
        raw_data: serde_json::to_value(response).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{DailyWeather, Transaction};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn ctx() -> SnapshotContext {
        SnapshotContext {
            marche_id: Uuid::new_v4(),
            latitude: 47.39,
            longitude: 0.68,
            snapshot_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        }
    }

    #[test]
    fn test_weather_aggregates() {
        let response = WeatherResponse {
            daily: Some(DailyWeather {
                time: vec!["2026-10-14".into(), "2026-10-15".into(), "2026-10-16".into()],
                temperature_2m_mean: Some(vec![Some(10.0), None, Some(14.0)]),
                temperature_2m_max: Some(vec![Some(15.0), Some(18.5), None]),
                temperature_2m_min: Some(vec![Some(4.0), Some(6.0), Some(2.5)]),
                relative_humidity_2m_mean: Some(vec![Some(80.0), Some(70.0), Some(75.0)]),
                precipitation_sum: Some(vec![Some(1.2), Some(0.0), Some(3.3)]),
                wind_speed_10m_mean: None,
                sunshine_duration: Some(vec![Some(7200.0), Some(3600.0), None]),
            }),
            ..Default::default()
        };

        let snap = weather_snapshot(&ctx(), &response);
        assert_eq!(snap.temperature_avg, Some(12.0));
        assert_eq!(snap.temperature_min, Some(2.5));
        assert_eq!(snap.temperature_max, Some(18.5));
        assert_eq!(snap.humidity_avg, Some(75.0));
        assert_eq!(snap.precipitation_total, Some(4.5));
        assert_eq!(snap.wind_speed_avg, None);
        assert_eq!(snap.sunshine_hours, Some(3.0));
    }

    #[test]
    fn test_weather_mean_falls_back_to_min_max() {
        let response = WeatherResponse {
            daily: Some(DailyWeather {
                temperature_2m_max: Some(vec![Some(20.0), Some(16.0), None]),
                temperature_2m_min: Some(vec![Some(10.0), Some(8.0), Some(1.0)]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let snap = weather_snapshot(&ctx(), &response);
        // (15 + 12) / 2, le troisième jour est incomplet
        assert_eq!(snap.temperature_avg, Some(13.5));
    }

    #[test]
    fn test_weather_without_daily() {
        let snap = weather_snapshot(&ctx(), &WeatherResponse::default());
        assert_eq!(snap.temperature_avg, None);
        assert_eq!(snap.sunshine_hours, None);
    }

    fn tx(price: Option<f64>, surface: Option<f64>, kind: Option<&str>) -> Transaction {
        Transaction {
            valeur_fonciere: price,
            surface_reelle_bati: surface,
            type_local: kind.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_real_estate_aggregates() {
        let response = RealEstateResponse {
            transactions: vec![
                tx(Some(200_000.0), Some(100.0), Some("Maison")),
                tx(Some(150_000.0), Some(50.0), Some("Appartement")),
                tx(Some(90_000.0), Some(60.0), Some("Maison")),
                tx(Some(30_000.0), None, None),
                tx(Some(0.0), Some(40.0), Some("Dépendance")),
            ],
        };

        let snap = real_estate_snapshot(&ctx(), 1000, &response);
        assert_eq!(snap.transactions_count, 5);
        // 2000, 3000, 1500
        assert_eq!(snap.avg_price_m2, Some(2166.67));
        assert_eq!(snap.median_price_m2, Some(2000.0));
        assert_eq!(snap.total_volume, 470_000.0);
        assert_eq!(snap.property_types["Maison"], 2);
        assert_eq!(snap.property_types["Inconnu"], 1);
        assert_eq!(snap.radius_meters, 1000);
    }

    #[test]
    fn test_median_even() {
        let mut v = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut v), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_real_estate_empty() {
        let snap = real_estate_snapshot(&ctx(), 1000, &RealEstateResponse::default());
        assert_eq!(snap.transactions_count, 0);
        assert_eq!(snap.avg_price_m2, None);
        assert_eq!(snap.total_volume, 0.0);
    }
}
