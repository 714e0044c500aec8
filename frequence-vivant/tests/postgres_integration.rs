//! Tests d'intégration PostgreSQL
//!
//! Ces tests nécessitent une base PostgreSQL disponible.
//! Configuration via variables d'environnement:
//! - PGHOST, PGPORT, PGUSER, PGPASSWORD, PGDATABASE
//!
//! Exécution:
//! ```bash
//! # Avec PostgreSQL local
//! cargo test --test postgres_integration -- --ignored
//!
//! # Avec Docker
//! docker run -d --name postgres-test -e POSTGRES_PASSWORD=test -p 5432:5432 postgres:16
//! PGPASSWORD=test cargo test --test postgres_integration -- --ignored
//! ```

mod common;

use anyhow::Result;
use deadpool_postgres::Pool;
use uuid::Uuid;

use frequence_vivant::collector::{collect_step, run_batch, BatchRequest, StepRequest};
use frequence_vivant::models::{CollectionMode, CollectionType, LogProgress};
use frequence_vivant::store::pool::{create_pool, test_connection, DatabaseConfig};
use frequence_vivant::store::postgres::TextesFilter;
use frequence_vivant::store::CollectionStore;
use frequence_vivant::PgStore;

use common::{fast_config, ScriptedSources};

/// Crée un pool de connexions de test
fn create_test_pool() -> Result<Pool> {
    let mut config = DatabaseConfig::from_env();
    config.url = None;
    create_pool(&config)
}

/// Schéma dédié, recréé à chaque test
async fn setup_store(schema: &str) -> Result<PgStore> {
    let pool = create_test_pool()?;
    let client = pool.get().await?;
    client
        .batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
        .await?;
    drop(client);

    let store = PgStore::new(pool, schema)?;
    store.create_schema().await?;
    Ok(store)
}

async fn insert_marche(
    store: &PgStore,
    schema: &str,
    nom: &str,
    coords: Option<(f64, f64)>,
) -> Result<Uuid> {
    let client = store.pool().get().await?;
    let row = client
        .query_one(
            &format!(
                "INSERT INTO {}.marches (nom_marche, ville, region, latitude, longitude, date) \
                 VALUES ($1, 'Tours', 'Centre-Val de Loire', $2, $3, '2024-05-01') RETURNING id",
                schema
            ),
            &[&nom, &coords.map(|c| c.0), &coords.map(|c| c.1)],
        )
        .await?;
    Ok(row.get(0))
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_database_connection() {
    let pool = create_test_pool().expect("Failed to create pool");
    test_connection(&pool).await.expect("Failed to connect");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_schema_creation_is_idempotent() {
    const SCHEMA: &str = "fv_schema_creation_is_idempotent";
    let store = setup_store(SCHEMA).await.expect("Failed to setup schema");
    store.create_schema().await.expect("Second creation failed");

    let client = store.pool().get().await.unwrap();
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = $1",
            &[&SCHEMA],
        )
        .await
        .unwrap();
    let count: i64 = row.get(0);
    assert_eq!(count, 6);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_log_lifecycle() {
    const SCHEMA: &str = "fv_log_lifecycle";
    let store = setup_store(SCHEMA).await.unwrap();

    let log_id = store
        .create_log(&[CollectionType::Weather], CollectionMode::Scheduled)
        .await
        .unwrap();
    store.set_log_total(log_id, 2).await.unwrap();
    store
        .update_log_progress(
            log_id,
            &LogProgress {
                marches_processed: 1,
                errors_count: 0,
                current_status: "Marche 1/2: Aube".into(),
            },
        )
        .await
        .unwrap();
    store.increment_log_errors(log_id).await.unwrap();

    let client = store.pool().get().await.unwrap();
    let row = client
        .query_one(
            &format!(
                "SELECT status, marches_total, marches_processed, errors_count, \
                 summary_stats ->> 'current_status' FROM {}.data_collection_logs WHERE id = $1",
                SCHEMA
            ),
            &[&log_id],
        )
        .await
        .unwrap();

    assert_eq!(row.get::<_, String>(0), "running");
    assert_eq!(row.get::<_, i32>(1), 2);
    assert_eq!(row.get::<_, i32>(2), 1);
    assert_eq!(row.get::<_, i32>(3), 1);
    assert_eq!(row.get::<_, String>(4), "Marche 1/2: Aube");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_unknown_log_is_an_error() {
    const SCHEMA: &str = "fv_unknown_log_is_an_error";
    let store = setup_store(SCHEMA).await.unwrap();
    assert!(store.increment_log_errors(Uuid::new_v4()).await.is_err());
    assert!(store.processed_marche_ids(Uuid::new_v4()).await.is_err());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_batch_against_postgres() {
    const SCHEMA: &str = "fv_batch_against_postgres";
    let store = setup_store(SCHEMA).await.unwrap();
    insert_marche(&store, SCHEMA, "Aube", Some((47.39, 0.68))).await.unwrap();
    insert_marche(&store, SCHEMA, "Sans GPS", None).await.unwrap();
    let sources = ScriptedSources::new();

    let request = BatchRequest {
        collection_types: vec![CollectionType::Biodiversity, CollectionType::RealEstate],
        mode: CollectionMode::Manual,
        marches_filter: None,
    };
    let report = run_batch(&store, &sources, &fast_config(), &request)
        .await
        .unwrap();

    assert_eq!(report.marches_total, 1);
    assert_eq!(report.marches_processed, 1);

    let client = store.pool().get().await.unwrap();
    let row = client
        .query_one(
            &format!(
                "SELECT status, (summary_stats ->> 'success_rate')::float8, \
                 (SELECT COUNT(*) FROM {s}.real_estate_snapshots) \
                 FROM {s}.data_collection_logs WHERE id = $1",
                s = SCHEMA
            ),
            &[&report.log_id],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, String>(0), "completed");
    assert_eq!(row.get::<_, f64>(1), 100.0);
    assert_eq!(row.get::<_, i64>(2), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_step_resumes_against_postgres() {
    const SCHEMA: &str = "fv_step_resumes_against_postgres";
    let store = setup_store(SCHEMA).await.unwrap();
    let marche_id = insert_marche(&store, SCHEMA, "Aube", Some((47.39, 0.68))).await.unwrap();
    let log_id = store
        .create_log(&[CollectionType::Biodiversity], CollectionMode::Manual)
        .await
        .unwrap();
    let sources = ScriptedSources::new();
    let request = StepRequest {
        log_id,
        marche_id,
        latitude: 47.39,
        longitude: 0.68,
        marche_name: None,
    };

    let first = collect_step(&store, &sources, &fast_config(), &request).await.unwrap();
    let second = collect_step(&store, &sources, &fast_config(), &request).await.unwrap();

    assert!(!first.already_processed);
    assert!(second.already_processed);
    assert_eq!(sources.biodiversity_calls(), 1);
    assert_eq!(store.processed_marche_ids(log_id).await.unwrap(), vec![marche_id]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_fetch_textes() {
    const SCHEMA: &str = "fv_fetch_textes";
    let store = setup_store(SCHEMA).await.unwrap();
    let marche_id = insert_marche(&store, SCHEMA, "Aube", Some((47.39, 0.68))).await.unwrap();

    let client = store.pool().get().await.unwrap();
    client
        .execute(
            &format!(
                "INSERT INTO {}.marche_textes (marche_id, titre, contenu, type_texte, ordre) VALUES \
                 ($1, 'Rosée', '<p>Une <em>goutte</em></p>', 'haiku', 1), \
                 ($1, 'Le héron', '<p>Il attend.</p>', 'fable', 2), \
                 (NULL, 'Hors marche', '<p>Vent</p>', 'haiku', NULL)",
                SCHEMA
            ),
            &[&marche_id],
        )
        .await
        .unwrap();

    let all = store.fetch_textes(&TextesFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].titre, "Rosée");
    assert_eq!(all[0].ville.as_deref(), Some("Tours"));

    let haikus = store
        .fetch_textes(&TextesFilter {
            marche_ids: Some(vec![marche_id]),
            types: Some(vec!["haiku".into()]),
        })
        .await
        .unwrap();
    assert_eq!(haikus.len(), 1);
    assert_eq!(haikus[0].marche_nom.as_deref(), Some("Aube"));
}
