// src/main.rs
use clap::Parser;
use ct_inventory::cli::{Cli, OutputFormat};
use ct_inventory::config::Config;
use ct_inventory::controller::{RunController, RunOptions};
use ct_inventory::database::{FileInventory, InventoryStore, PostgresBackend, RunMetadataStore};
use ct_inventory::notifier::{LogNotifier, NotificationChannel, WebhookNotifier};
use ct_inventory::output::{OutputManager, RunReport, csv, human, json};
use ct_inventory::reconciler::Reconciler;
use ct_inventory::source::{CrtShClient, DiscoverySource};
use ct_inventory::stats::RunStats;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    cli.validate()?;

    let config = Config::from_file(Path::new(&cli.config))?;

    // Initialize logging
    let log_level = cli.log_level().unwrap_or(&config.logging.level);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting ct-inventory for {} domain(s)...", cli.domains.len());

    // Inventory and run metadata live in the same backend
    let mut postgres = None;
    let inventory: Arc<dyn InventoryStore>;
    let metadata: Arc<dyn RunMetadataStore>;

    if config.database.enabled {
        tracing::info!("Database enabled, connecting to PostgreSQL...");
        let backend = Arc::new(
            PostgresBackend::new(&config.database.url, config.database.max_connections).await?,
        );
        backend.migrate().await?;
        tracing::info!("Database initialized and migrated successfully");

        inventory = backend.clone();
        metadata = backend.clone();
        postgres = Some(backend);
    } else {
        tracing::info!(
            "Database disabled, using inventory file: {}",
            config.inventory.state_file
        );
        let file = Arc::new(FileInventory::open(PathBuf::from(&config.inventory.state_file)).await?);

        inventory = file.clone();
        metadata = file;
    }

    let notifier: Arc<dyn NotificationChannel> = if cli.no_notify {
        tracing::info!("Notifications disabled, logging them instead");
        Arc::new(LogNotifier)
    } else {
        if config.notifications.webhook.is_none() {
            tracing::debug!("No operator webhook configured");
        }
        Arc::new(WebhookNotifier::new(&config.notifications))
    };

    let source: Arc<dyn DiscoverySource> = Arc::new(CrtShClient::new(&config.source)?);

    let controller = RunController::new(
        source,
        Reconciler::new(inventory, config.source.tag.clone(), config.reconcile.workers),
        metadata,
        notifier,
        RunOptions {
            force_run: cli.force_run,
            source_tag: config.source.tag.clone(),
            category: config.reconcile.category.clone(),
        },
    );

    // Create output manager
    let mut output_manager = OutputManager::new();

    match cli.output_format() {
        OutputFormat::Human => {
            if let Some(ref path) = cli.output {
                let file = std::fs::File::create(path)?;
                output_manager.add_handler(Arc::new(human::HumanOutput::to_file(file)));
                tracing::info!("Writing human-readable output to: {}", path);
            } else {
                output_manager.add_handler(Arc::new(human::HumanOutput::new()));
            }
        }
        OutputFormat::Json => {
            if let Some(ref path) = cli.output {
                let file = std::fs::File::create(path)?;
                output_manager.add_handler(Arc::new(json::JsonOutput::to_file(file)));
                tracing::info!("Writing JSON output to: {}", path);
            } else {
                output_manager.add_handler(Arc::new(json::JsonOutput::new()));
            }
        }
        OutputFormat::Csv => {
            if let Some(ref path) = cli.output {
                let file = std::fs::File::create(path)?;
                output_manager.add_handler(Arc::new(csv::CsvOutput::to_file(file)));
                tracing::info!("Writing CSV output to: {}", path);
            } else {
                output_manager.add_handler(Arc::new(csv::CsvOutput::new()));
            }
        }
    }

    let stats = RunStats::new();
    let results = controller.run_all(&cli.domains).await;

    for result in &results {
        let report = RunReport::from_result(result);
        stats.record(&report);
        if let Err(e) = output_manager.emit(&report).await {
            tracing::error!("Failed to write report for {}: {}", report.domain, e);
        }
    }
    output_manager.flush().await?;

    if let Some(backend) = postgres {
        backend.close().await;
    }

    tracing::info!("Finished: {}", stats.format_stats());

    let failed = stats.snapshot().failed;
    if failed > 0 {
        anyhow::bail!("{} of {} domain(s) failed", failed, cli.domains.len());
    }

    Ok(())
}
