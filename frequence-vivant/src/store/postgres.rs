//! Stockage PostgreSQL (tables du backend Supabase)

use anyhow::{Context, Result};
use chrono::NaiveDate;
use deadpool_postgres::Pool;
use serde_json::Value;
use textes_export::TexteExport;
use tracing::{debug, info};
use uuid::Uuid;

use super::CollectionStore;
use crate::models::{
    BiodiversitySnapshot, CollectionMode, CollectionType, LogProgress, Marche, MarchesFilter,
    RealEstateSnapshot, WeatherSnapshot,
};

/// Filtre de sélection des textes à exporter
#[derive(Debug, Clone, Default)]
pub struct TextesFilter {
    pub marche_ids: Option<Vec<Uuid>>,
    pub types: Option<Vec<String>>,
}

/// Stockage PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    schema: String,
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl PgStore {
    pub fn new(pool: Pool, schema: &str) -> Result<Self> {
        if !is_valid_identifier(schema) {
            anyhow::bail!("Invalid schema name: {}", schema);
        }
        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }

    /// Crée les tables si elles n'existent pas (développement local, tests).
    ///
    /// En production le schéma appartient au backend.
    pub async fn create_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;
        let s = &self.schema;

        let sql = format!(
            r#"
            CREATE SCHEMA IF NOT EXISTS {s};

            CREATE TABLE IF NOT EXISTS {s}.marches (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                nom_marche TEXT,
                ville TEXT NOT NULL DEFAULT '',
                region TEXT,
                departement TEXT,
                latitude DOUBLE PRECISION,
                longitude DOUBLE PRECISION,
                date DATE
            );

            CREATE TABLE IF NOT EXISTS {s}.data_collection_logs (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                collection_type TEXT NOT NULL,
                collection_mode TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                completed_at TIMESTAMPTZ,
                marches_total INTEGER NOT NULL DEFAULT 0,
                marches_processed INTEGER NOT NULL DEFAULT 0,
                errors_count INTEGER NOT NULL DEFAULT 0,
                summary_stats JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                duration_seconds INTEGER
            );

            CREATE TABLE IF NOT EXISTS {s}.biodiversity_snapshots (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                marche_id UUID NOT NULL,
                latitude DOUBLE PRECISION NOT NULL,
                longitude DOUBLE PRECISION NOT NULL,
                radius_meters INTEGER NOT NULL,
                snapshot_date DATE NOT NULL,
                total_species INTEGER NOT NULL,
                birds_count INTEGER NOT NULL,
                plants_count INTEGER NOT NULL,
                fungi_count INTEGER NOT NULL,
                others_count INTEGER NOT NULL,
                recent_observations INTEGER NOT NULL,
                biodiversity_index DOUBLE PRECISION,
                species_data JSONB,
                methodology JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS {s}.weather_snapshots (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                marche_id UUID NOT NULL,
                latitude DOUBLE PRECISION NOT NULL,
                longitude DOUBLE PRECISION NOT NULL,
                snapshot_date DATE NOT NULL,
                temperature_avg DOUBLE PRECISION,
                temperature_min DOUBLE PRECISION,
                temperature_max DOUBLE PRECISION,
                humidity_avg DOUBLE PRECISION,
                precipitation_total DOUBLE PRECISION,
                wind_speed_avg DOUBLE PRECISION,
                sunshine_hours DOUBLE PRECISION,
                raw_data JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS {s}.real_estate_snapshots (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                marche_id UUID NOT NULL,
                latitude DOUBLE PRECISION NOT NULL,
                longitude DOUBLE PRECISION NOT NULL,
                radius_meters INTEGER NOT NULL,
                snapshot_date DATE NOT NULL,
                transactions_count INTEGER NOT NULL,
                avg_price_m2 DOUBLE PRECISION,
                median_price_m2 DOUBLE PRECISION,
                total_volume DOUBLE PRECISION NOT NULL,
                property_types JSONB,
                raw_data JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS {s}.marche_textes (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                marche_id UUID,
                titre TEXT NOT NULL DEFAULT '',
                contenu TEXT NOT NULL DEFAULT '',
                type_texte TEXT NOT NULL,
                ordre INTEGER,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#
        );

        client
            .batch_execute(&sql)
            .await
            .context("Failed to create collection tables")?;

        info!(schema = %self.schema, "Schema ready");
        Ok(())
    }

    /// Textes à exporter, avec les informations de leur marche
    pub async fn fetch_textes(&self, filter: &TextesFilter) -> Result<Vec<TexteExport>> {
        let client = self.pool.get().await?;

        let sql = format!(
            r#"
            SELECT t.id::text AS id, t.titre, t.contenu, t.type_texte,
                   t.marche_id::text AS marche_id, m.nom_marche, m.ville, m.region,
                   m.date AS marche_date, t.ordre
            FROM {} t
            LEFT JOIN {} m ON m.id = t.marche_id
            WHERE ($1::uuid[] IS NULL OR t.marche_id = ANY($1))
              AND ($2::text[] IS NULL OR t.type_texte = ANY($2))
            ORDER BY m.date NULLS LAST, t.ordre NULLS LAST, t.created_at
            "#,
            self.table("marche_textes"),
            self.table("marches"),
        );

        let rows = client
            .query(&sql, &[&filter.marche_ids, &filter.types])
            .await
            .context("Failed to load texts")?;

        let textes = rows
            .iter()
            .map(|row| TexteExport {
                id: row.get("id"),
                titre: row.get("titre"),
                contenu: row.get("contenu"),
                type_texte: row.get("type_texte"),
                marche_id: row.get("marche_id"),
                marche_nom: row.get("nom_marche"),
                ville: row.get("ville"),
                region: row.get("region"),
                marche_date: row.get::<_, Option<NaiveDate>>("marche_date"),
                ordre: row.get("ordre"),
            })
            .collect::<Vec<_>>();

        debug!(count = textes.len(), "Texts loaded");
        Ok(textes)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn tokio_postgres::types::ToSql + Sync)]) -> Result<u64> {
        let client = self.pool.get().await?;
        Ok(client.execute(sql, params).await?)
    }

    async fn update_log(
        &self,
        log_id: Uuid,
        set: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET {} WHERE id = $1",
            self.table("data_collection_logs"),
            set
        );
        let mut all: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = vec![&log_id];
        all.extend_from_slice(params);

        let updated = self
            .execute(&sql, &all)
            .await
            .with_context(|| format!("Failed to update collection log {}", log_id))?;
        if updated == 0 {
            anyhow::bail!("Collection log {} not found", log_id);
        }
        Ok(())
    }
}

impl CollectionStore for PgStore {
    async fn fetch_marches(&self, filter: &MarchesFilter) -> Result<Vec<Marche>> {
        let client = self.pool.get().await?;

        let sql = format!(
            r#"
            SELECT id, nom_marche, ville, region, departement, latitude, longitude, date
            FROM {}
            WHERE ($1::uuid[] IS NULL OR id = ANY($1))
              AND ($2::text IS NULL OR region = $2)
              AND ($3::text IS NULL OR departement = $3)
            ORDER BY date NULLS LAST, id
            "#,
            self.table("marches")
        );

        let rows = client
            .query(&sql, &[&filter.ids, &filter.region, &filter.departement])
            .await
            .context("Failed to load marches")?;

        Ok(rows
            .iter()
            .map(|row| Marche {
                id: row.get("id"),
                nom_marche: row.get("nom_marche"),
                ville: row.get::<_, Option<String>>("ville").unwrap_or_default(),
                region: row.get("region"),
                departement: row.get("departement"),
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
                date: row.get("date"),
            })
            .collect())
    }

    async fn create_log(&self, types: &[CollectionType], mode: CollectionMode) -> Result<Uuid> {
        let client = self.pool.get().await?;
        let collection_type = types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {} (collection_type, collection_mode, status, started_at, summary_stats) \
                     VALUES ($1, $2, 'running', NOW(), '{{}}'::jsonb) RETURNING id",
                    self.table("data_collection_logs")
                ),
                &[&collection_type, &mode.as_str()],
            )
            .await
            .context("Failed to create collection log")?;

        Ok(row.get(0))
    }

    async fn set_log_total(&self, log_id: Uuid, total: i32) -> Result<()> {
        self.update_log(log_id, "marches_total = $2", &[&total]).await
    }

    async fn update_log_progress(&self, log_id: Uuid, progress: &LogProgress) -> Result<()> {
        self.update_log(
            log_id,
            "marches_processed = $2, errors_count = $3, \
             summary_stats = COALESCE(summary_stats, '{}'::jsonb) \
                 || jsonb_build_object('current_status', $4::text)",
            &[
                &progress.marches_processed,
                &progress.errors_count,
                &progress.current_status,
            ],
        )
        .await
    }

    async fn finalize_log(
        &self,
        log_id: Uuid,
        progress: &LogProgress,
        summary: &Value,
        duration_seconds: i32,
    ) -> Result<()> {
        self.update_log(
            log_id,
            "status = 'completed', completed_at = NOW(), duration_seconds = $2, \
             marches_processed = $3, errors_count = $4, \
             summary_stats = COALESCE(summary_stats, '{}'::jsonb) || $5::jsonb \
                 || jsonb_build_object('current_status', $6::text)",
            &[
                &duration_seconds,
                &progress.marches_processed,
                &progress.errors_count,
                summary,
                &progress.current_status,
            ],
        )
        .await
    }

    async fn fail_log(&self, log_id: Uuid, message: &str) -> Result<()> {
        self.update_log(
            log_id,
            "status = 'failed', completed_at = NOW(), \
             summary_stats = COALESCE(summary_stats, '{}'::jsonb) \
                 || jsonb_build_object('error', $2::text)",
            &[&message],
        )
        .await
    }

    async fn increment_log_errors(&self, log_id: Uuid) -> Result<()> {
        self.update_log(log_id, "errors_count = errors_count + 1", &[])
            .await
    }

    async fn processed_marche_ids(&self, log_id: Uuid) -> Result<Vec<Uuid>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT COALESCE(summary_stats -> 'processed_marche_ids', '[]'::jsonb) \
                     FROM {} WHERE id = $1",
                    self.table("data_collection_logs")
                ),
                &[&log_id],
            )
            .await
            .context("Failed to read collection log")?
            .with_context(|| format!("Collection log {} not found", log_id))?;

        let ids: Value = row.get(0);
        Ok(ids
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| Uuid::parse_str(s).ok())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn record_step_progress(&self, log_id: Uuid, marche_id: Uuid) -> Result<()> {
        // Lecture-modification-écriture côté SQL: pas de verrou entre appels concurrents
        self.update_log(
            log_id,
            "marches_processed = marches_processed + 1, \
             summary_stats = jsonb_set(COALESCE(summary_stats, '{}'::jsonb), '{processed_marche_ids}', \
                 COALESCE(summary_stats -> 'processed_marche_ids', '[]'::jsonb) || to_jsonb($2::text))",
            &[&marche_id.to_string()],
        )
        .await
    }

    async fn insert_biodiversity(&self, s: &BiodiversitySnapshot) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (marche_id, latitude, longitude, radius_meters, snapshot_date, \
             total_species, birds_count, plants_count, fungi_count, others_count, \
             recent_observations, biodiversity_index, species_data, methodology) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            self.table("biodiversity_snapshots")
        );
        self.execute(
            &sql,
            &[
                &s.marche_id,
                &s.latitude,
                &s.longitude,
                &s.radius_meters,
                &s.snapshot_date,
                &s.total_species,
                &s.birds_count,
                &s.plants_count,
                &s.fungi_count,
                &s.others_count,
                &s.recent_observations,
                &s.biodiversity_index,
                &s.species_data,
                &s.methodology,
            ],
        )
        .await
        .context("Failed to insert biodiversity snapshot")?;
        Ok(())
    }

    async fn insert_weather(&self, s: &WeatherSnapshot) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (marche_id, latitude, longitude, snapshot_date, temperature_avg, \
             temperature_min, temperature_max, humidity_avg, precipitation_total, \
             wind_speed_avg, sunshine_hours, raw_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            self.table("weather_snapshots")
        );
        self.execute(
            &sql,
            &[
                &s.marche_id,
                &s.latitude,
                &s.longitude,
                &s.snapshot_date,
                &s.temperature_avg,
                &s.temperature_min,
                &s.temperature_max,
                &s.humidity_avg,
                &s.precipitation_total,
                &s.wind_speed_avg,
                &s.sunshine_hours,
                &s.raw_data,
            ],
        )
        .await
        .context("Failed to insert weather snapshot")?;
        Ok(())
    }

    async fn insert_real_estate(&self, s: &RealEstateSnapshot) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (marche_id, latitude, longitude, radius_meters, snapshot_date, \
             transactions_count, avg_price_m2, median_price_m2, total_volume, \
             property_types, raw_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            self.table("real_estate_snapshots")
        );
        self.execute(
            &sql,
            &[
                &s.marche_id,
                &s.latitude,
                &s.longitude,
                &s.radius_meters,
                &s.snapshot_date,
                &s.transactions_count,
                &s.avg_price_m2,
                &s.median_price_m2,
                &s.total_volume,
                &s.property_types,
                &s.raw_data,
            ],
        )
        .await
        .context("Failed to insert real estate snapshot")?;
        Ok(())
    }
}
