//! Fault Harvester CLI
//!
//! Local execution entry point.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use fault_harvester::{
    error::Result,
    models::Config,
    pipeline,
    storage::CatalogStore,
};

/// Harvests vehicle electrical fault threads into a catalog
#[derive(Parser, Debug)]
#[command(
    name = "fault-harvester",
    version,
    about = "Vehicle electrical fault forum harvester"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest all sources and update the catalog
    Run,

    /// Validate the configuration file
    Validate,

    /// Show catalog statistics
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    log::info!("Configuration: {}", cli.config.display());

    let catalog = CatalogStore::new(&config.catalog);

    match cli.command {
        Command::Run => {
            config.validate()?;

            let fetcher = pipeline::build_fetcher(&config)?;
            let today = Local::now().date_naive();
            let summary = pipeline::run_harvest(&config, &fetcher, &catalog, today).await?;

            log::info!("Total records: {}", summary.merge.total);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} sources, {} symptoms, {} brands)",
                config.sources.len(),
                config.vocabulary.symptoms.len(),
                config.vocabulary.brands.len()
            );
        }

        Command::Info => {
            log::info!("Catalog: {}", catalog.data_path().display());
            log::info!("Mirror: {}", catalog.mirror_path().display());

            let records = catalog.load().await?;
            log::info!("Records: {} / {}", records.len(), catalog.max_records());

            let mut per_source: BTreeMap<&str, usize> = BTreeMap::new();
            for record in &records {
                let name = if record.source.is_empty() {
                    "(unknown)"
                } else {
                    record.source.as_str()
                };
                *per_source.entry(name).or_default() += 1;
            }
            for (source, count) in &per_source {
                log::info!("    {}: {}", source, count);
            }

            if let Some(latest) = records.iter().map(|r| r.date_added.as_str()).max() {
                log::info!("Last added: {}", latest);
            }
        }
    }

    Ok(())
}
