//! Point d'entrée CLI pour frequence-vivant

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use frequence_vivant::collector::StepRequest;

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{Commands, ExportArgs};

/// Collecte de données et export des textes de La Fréquence du Vivant
#[derive(Parser)]
#[command(name = "frequence-vivant")]
#[command(author, version)]
#[command(about = "Collecte biodiversité, météo et immobilier pour les marches, export des textes")]
#[command(long_about = "Collecte les données environnementales des marches (biodiversité, météo, immobilier) vers PostgreSQL et exporte les textes en Word, PDF ou CSV.\n\nLes fonctions de collecte sont aussi exposées en HTTP avec 'serve'.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Collect {
            types,
            mode,
            region,
            departement,
            ids,
            config,
            report,
            dry_run,
            marches_file,
            db,
        } => {
            info!(types = ?types, mode = mode.as_str(), dry_run, "Collecte batch");
            cli::cmd_collect(
                types,
                mode,
                region,
                departement,
                ids,
                config,
                report,
                dry_run,
                marches_file,
                db,
            )
            .await?;
        }
        Commands::CollectStep {
            log_id,
            marche_id,
            latitude,
            longitude,
            name,
            config,
            db,
        } => {
            info!(log_id = %log_id, marche = %marche_id, "Collecte par étape");
            let request = StepRequest {
                log_id,
                marche_id,
                latitude,
                longitude,
                marche_name: name,
            };
            cli::cmd_collect_step(request, config, db).await?;
        }
        Commands::Export {
            format,
            output,
            group_by,
            title,
            subtitle,
            from_json,
            marche_ids,
            types,
            no_toc,
            no_metadata,
            pdf_font,
            db,
        } => {
            info!(format = %format, output = %output.display(), "Export des textes");
            cli::cmd_export(ExportArgs {
                format,
                output,
                group_by,
                title,
                subtitle,
                from_json,
                marche_ids,
                types,
                no_toc,
                no_metadata,
                pdf_font,
                db,
            })
            .await?;
        }
        Commands::Serve {
            port,
            host,
            config,
            db,
        } => {
            info!(host = %host, port, "Démarrage du serveur");
            cli::cmd_serve(&host, port, config, db).await?;
        }
        Commands::InitSchema { db } => {
            info!(schema = %db.schema, "Création du schéma");
            cli::cmd_init_schema(db).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
