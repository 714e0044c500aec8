//! Définition et implémentation des commandes CLI
//!
//! - `collect`: collecte batch (biodiversité, météo, immobilier)
//! - `collect-step`: collecte biodiversité d'une marche, avec reprise
//! - `export`: textes → Word, PDF ou CSV
//! - `serve`: serveur HTTP des collecteurs
//! - `init-schema`: création des tables (base locale)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;
use uuid::Uuid;

use frequence_vivant::collector::{self, BatchRequest, StepRequest};
use frequence_vivant::models::{CollectionMode, CollectionType, MarchesFilter};
use frequence_vivant::server::{self, AppState};
use frequence_vivant::store::pool::{self, DatabaseConfig};
use frequence_vivant::store::postgres::TextesFilter;
use frequence_vivant::{CollectorConfig, HttpSources, MemoryStore, PgStore};
use textes_export::{ExportOptions, Format, GroupBy, TexteExport};

#[derive(Subcommand)]
pub enum Commands {
    /// Run a batch collection over all marches
    Collect {
        /// Collection types, comma separated (biodiversity, weather, real_estate)
        #[arg(short, long, value_delimiter = ',', required = true)]
        types: Vec<CollectionType>,

        /// Collection mode recorded in the log (manual, scheduled)
        #[arg(long, default_value = "manual")]
        mode: CollectionMode,

        /// Only marches of this region
        #[arg(long)]
        region: Option<String>,

        /// Only marches of this departement
        #[arg(long)]
        departement: Option<String>,

        /// Only these marche ids (comma separated)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<Uuid>,

        /// Collector config file (JSON); env variables override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Collect without database: marches from --marches-file, snapshots kept in memory
        #[arg(long, requires = "marches_file")]
        dry_run: bool,

        /// JSON array of marches (with --dry-run)
        #[arg(long)]
        marches_file: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Collect biodiversity for one marche of an existing log
    CollectStep {
        /// Collection log id
        #[arg(long)]
        log_id: Uuid,

        /// Marche id
        #[arg(long)]
        marche_id: Uuid,

        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,

        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,

        /// Marche name (logs only)
        #[arg(long)]
        name: Option<String>,

        /// Collector config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Export texts to Word, PDF or CSV
    Export {
        /// Output format: docx, pdf, csv
        #[arg(short, long, default_value = "docx")]
        format: Format,

        /// Output file or directory
        #[arg(short, long)]
        output: PathBuf,

        /// Grouping: type, marche
        #[arg(long, default_value = "type")]
        group_by: GroupBy,

        /// Cover title
        #[arg(long)]
        title: Option<String>,

        /// Cover subtitle
        #[arg(long)]
        subtitle: Option<String>,

        /// Read texts from a JSON file instead of the database
        #[arg(long)]
        from_json: Option<PathBuf>,

        /// Only texts of these marches (comma separated)
        #[arg(long, value_delimiter = ',')]
        marche_ids: Vec<Uuid>,

        /// Only these text types (comma separated)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,

        /// No table of contents
        #[arg(long)]
        no_toc: bool,

        /// No metadata line under each title
        #[arg(long)]
        no_metadata: bool,

        /// TrueType font for PDF output (accents outside Latin-1)
        #[arg(long)]
        pdf_font: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Serve the collectors over HTTP
    Serve {
        /// Listen port
        #[arg(long, env = "SERVER_PORT", default_value_t = 8787)]
        port: u16,

        /// Listen address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Collector config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Create the tables if they do not exist (local database)
    InitSchema {
        #[command(flatten)]
        db: DbArgs,
    },
}

/// Connexion PostgreSQL (défaut: variables d'environnement).
///
/// Préfixe `--db-` pour ne pas entrer en conflit avec `serve --host/--port`.
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// PostgreSQL schema
    #[arg(long = "db-schema", id = "db_schema", default_value = "public")]
    pub schema: String,

    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long = "db-host", id = "db_host")]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / postgres)
    #[arg(long = "db-name", id = "db_name")]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long = "db-user", id = "db_user")]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long = "db-password", id = "db_password")]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long = "db-port", id = "db_port")]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long = "db-ssl", id = "db_ssl")]
    pub ssl: Option<String>,
}

impl DbArgs {
    fn database_config(&self) -> DatabaseConfig {
        let mut config = DatabaseConfig::from_env();
        apply_database_overrides(&mut config, self);
        config
    }

    /// Connecte et vérifie la base
    async fn connect(&self) -> Result<PgStore> {
        let db_config = self.database_config();
        println!("Database: {}", db_config.describe());

        let pool = pool::create_pool(&db_config)?;
        pool::test_connection(&pool).await?;
        PgStore::new(pool, &self.schema)
    }
}

fn apply_database_overrides(config: &mut DatabaseConfig, args: &DbArgs) {
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(database) = &args.database {
        config.dbname = database.clone();
    }
    if let Some(user) = &args.user {
        config.user = user.clone();
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ssl) = &args.ssl {
        if let Ok(mode) = ssl.parse() {
            config.ssl_mode = mode;
        }
    }
}

/// Fichier optionnel + environnement, validé
fn load_collector_config(path: Option<&Path>) -> Result<CollectorConfig> {
    CollectorConfig::resolve(path).context("Invalid collector configuration")
}

fn build_filter(
    region: Option<String>,
    departement: Option<String>,
    ids: Vec<Uuid>,
) -> Option<MarchesFilter> {
    if region.is_none() && departement.is_none() && ids.is_empty() {
        return None;
    }
    Some(MarchesFilter {
        ids: (!ids.is_empty()).then_some(ids),
        region,
        departement,
    })
}

/// Exécute la commande collect
#[allow(clippy::too_many_arguments)]
pub async fn cmd_collect(
    types: Vec<CollectionType>,
    mode: CollectionMode,
    region: Option<String>,
    departement: Option<String>,
    ids: Vec<Uuid>,
    config_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
    dry_run: bool,
    marches_file: Option<PathBuf>,
    db: DbArgs,
) -> Result<()> {
    let config = load_collector_config(config_path.as_deref())?;
    let sources = HttpSources::new(&config)?;
    let request = BatchRequest {
        collection_types: types,
        mode,
        marches_filter: build_filter(region, departement, ids),
    };

    println!("=== Collecte {} ===", request.mode.as_str());
    println!(
        "Types: {}",
        request
            .collection_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Sources: {}", config.supabase_url);

    let report = if dry_run {
        let path = marches_file.context("--dry-run requires --marches-file")?;
        println!("Dry run: marches from {}", path.display());
        let store = MemoryStore::from_json_file(&path)?;
        collector::run_batch(&store, &sources, &config, &request).await?
    } else {
        let store = db.connect().await?;
        collector::run_batch(&store, &sources, &config, &request).await?
    };

    report.display();

    if let Some(path) = report_path {
        report
            .save_to_file(&path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    Ok(())
}

/// Exécute la commande collect-step
pub async fn cmd_collect_step(request: StepRequest, config_path: Option<PathBuf>, db: DbArgs) -> Result<()> {
    let config = load_collector_config(config_path.as_deref())?;
    let sources = HttpSources::new(&config)?;
    let store = db.connect().await?;

    let outcome = collector::collect_step(&store, &sources, &config, &request).await?;

    if outcome.already_processed {
        println!("Marche {} already processed for log {}", outcome.marche_id, request.log_id);
    } else {
        println!(
            "Marche {}: {} species ({} attempt(s))",
            outcome.marche_id, outcome.species_count, outcome.attempts
        );
    }
    Ok(())
}

/// Arguments de la commande export
pub struct ExportArgs {
    pub format: Format,
    pub output: PathBuf,
    pub group_by: GroupBy,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub from_json: Option<PathBuf>,
    pub marche_ids: Vec<Uuid>,
    pub types: Vec<String>,
    pub no_toc: bool,
    pub no_metadata: bool,
    pub pdf_font: Option<PathBuf>,
    pub db: DbArgs,
}

impl ExportArgs {
    fn options(&self) -> ExportOptions {
        let defaults = ExportOptions::default();
        ExportOptions {
            title: self.title.clone().unwrap_or(defaults.title),
            subtitle: self.subtitle.clone().or(defaults.subtitle),
            group_by: self.group_by,
            include_toc: !self.no_toc,
            include_metadata: !self.no_metadata,
            pdf_font: self.pdf_font.clone(),
            ..defaults
        }
    }
}

/// Lit les textes depuis un fichier JSON et applique les filtres
fn load_textes_file(path: &Path, marche_ids: &[Uuid], types: &[String]) -> Result<Vec<TexteExport>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let textes: Vec<TexteExport> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse texts from {}", path.display()))?;

    let ids: Vec<String> = marche_ids.iter().map(Uuid::to_string).collect();
    Ok(textes
        .into_iter()
        .filter(|t| {
            ids.is_empty()
                || t.marche_id
                    .as_deref()
                    .map(|id| ids.iter().any(|m| m.eq_ignore_ascii_case(id)))
                    .unwrap_or(false)
        })
        .filter(|t| types.is_empty() || types.iter().any(|ty| ty == &t.type_texte))
        .collect())
}

/// Exécute la commande export
pub async fn cmd_export(args: ExportArgs) -> Result<()> {
    let textes = match &args.from_json {
        Some(path) => load_textes_file(path, &args.marche_ids, &args.types)?,
        None => {
            let store = args.db.connect().await?;
            let filter = TextesFilter {
                marche_ids: (!args.marche_ids.is_empty()).then(|| args.marche_ids.clone()),
                types: (!args.types.is_empty()).then(|| args.types.clone()),
            };
            store.fetch_textes(&filter).await?
        }
    };

    println!("=== Export {} ===", args.format);
    println!("Textes: {}", textes.len());
    println!("Regroupement: {:?}", args.group_by);

    let options = args.options();
    let path = textes_export::export_to_file(&textes, &options, args.format, &args.output)?;

    println!("Fichier: {}", path.display());
    Ok(())
}

/// Exécute la commande serve
pub async fn cmd_serve(host: &str, port: u16, config_path: Option<PathBuf>, db: DbArgs) -> Result<()> {
    let config = load_collector_config(config_path.as_deref())?;
    let sources = HttpSources::new(&config)?;
    let store = db.connect().await?;

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    server::serve(addr, AppState::new(store, sources, config)).await
}

/// Exécute la commande init-schema
pub async fn cmd_init_schema(db: DbArgs) -> Result<()> {
    let store = db.connect().await?;
    store.create_schema().await?;
    println!("Schema {} ready", db.schema);
    Ok(())
}
