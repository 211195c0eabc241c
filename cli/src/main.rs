//! Allocation operator CLI
//!
//! ```sh
//! # Create or upgrade the schema (default config: ~/.config/allocation/config.toml)
//! allocation migrate
//!
//! allocation add-batch batch-001 SMALL-TABLE 20 --eta 2026-11-02
//! allocation allocate order-17 SMALL-TABLE 2
//! allocation reallocate order-17 SMALL-TABLE
//! allocation list --json
//!
//! # Validate config without touching the database
//! allocation --check
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use allocation::application::{AddBatch, Allocate, Deallocate};
use allocation::bootstrap::{init_tracing, AppHandle, AppOptions};
use allocation::config::AppConfig;
use allocation::shared::validations::parse_eta;
use allocation::DomainError;

#[derive(Parser, Debug)]
#[command(
    name = "allocation",
    version,
    about = "Allocate order lines to stock batches",
    long_about = "Manage stock batches and allocate customer order lines to them.\n\n\
                  Default config: ~/.config/allocation/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "ALLOCATION_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Override the database URL, e.g. sqlite://./stock.db?mode=rwc
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Validate the configuration file and exit.
    #[arg(long)]
    check: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Register a new batch of stock.
    AddBatch {
        reference: String,
        sku: String,
        quantity: u32,
        /// Expected arrival (YYYY-MM-DD). Omit for stock already in the warehouse.
        #[arg(long)]
        eta: Option<String>,
    },
    /// Allocate an order line and print the chosen batch.
    Allocate {
        order_id: String,
        sku: String,
        quantity: u32,
    },
    /// Remove an order line from its batch.
    Deallocate { order_id: String, sku: String },
    /// Move an allocated order line to the best batch available now.
    Reallocate { order_id: String, sku: String },
    /// Show every batch with its allocations.
    List {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(allocation::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", config_path.display(), e);
            return ExitCode::from(2);
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ref url) = cli.database_url {
        config.database.url = Some(url.clone());
    }

    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());

    if cli.check {
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Database    : {}", config.database.connection_url());
        println!("   Log level   : {}", config.logging.level);
        println!("   Log format  : {}", config.logging.format);
        return ExitCode::SUCCESS;
    }

    let Some(command) = cli.command else {
        eprintln!("No command given. Run with --help to see the available commands.");
        return ExitCode::from(1);
    };

    match run(config, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(e.as_ref()))
        }
    }
}

async fn run(config: AppConfig, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let mut opts = AppOptions::new(config);
    if matches!(command, Command::Migrate) {
        opts.auto_migrate = true;
    }
    let app = AppHandle::start(opts).await?;
    let retry = app.config.retry.clone();

    match command {
        Command::Migrate => println!("Schema is up to date"),
        Command::AddBatch {
            reference,
            sku,
            quantity,
            eta,
        } => {
            let eta = eta.as_deref().map(parse_eta).transpose()?;
            app.service
                .add_batch(AddBatch {
                    reference: reference.clone(),
                    sku,
                    quantity,
                    eta,
                })
                .await?;
            println!("Added batch {}", reference);
        }
        Command::Allocate {
            order_id,
            sku,
            quantity,
        } => {
            let batchref = app
                .service
                .allocate_with_retry(
                    Allocate {
                        order_id,
                        sku,
                        quantity,
                    },
                    &retry,
                )
                .await?;
            println!("{}", batchref);
        }
        Command::Deallocate { order_id, sku } => {
            let batchref = app.service.deallocate(Deallocate { order_id, sku }).await?;
            println!("Deallocated from {}", batchref);
        }
        Command::Reallocate { order_id, sku } => {
            let batchref = app.service.reallocate(Deallocate { order_id, sku }).await?;
            println!("{}", batchref);
        }
        Command::List { json } => {
            let batches = app.service.list_batches().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&batches)?);
            } else {
                for b in &batches {
                    let eta = b.eta.map(|d| d.to_string()).unwrap_or_else(|| "in stock".into());
                    println!(
                        "{:<20} {:<24} {:>6}/{:<6} {}",
                        b.reference, b.sku, b.available_quantity, b.purchased_quantity, eta
                    );
                    for line in &b.allocations {
                        println!("    {} x{}", line.order_id, line.quantity);
                    }
                }
            }
        }
    }

    app.close().await?;
    Ok(())
}

/// 1 for requests the user can fix, 2 for everything else.
fn exit_code(err: &(dyn std::error::Error + 'static)) -> u8 {
    match err.downcast_ref::<DomainError>() {
        Some(e) if e.is_client_error() => 1,
        _ => 2,
    }
}
