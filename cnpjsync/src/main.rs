//! cnpjsync - CNPJ/MCC store synchronization and lookup
//!
//! `sync` runs one refresh cycle against the observed source versions
//! (supplied by the collaborator that probes the publishers); `lookup`
//! queries the local store by CNPJ or 8-digit root.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cnpjsync::fetch::{Fetcher, HttpTransport};
use cnpjsync::orchestrator::run_cycle;
use cnpjsync::probe::StaticProbe;
use cnpjsync::{SyncConfig, VersionLedger};
use cnpjsync_common::cnpj;
use cnpjsync_common::db::init_database;
use cnpjsync_common::db::lookup::{self, LookupRow};

/// Command-line arguments for cnpjsync
#[derive(Parser, Debug)]
#[command(name = "cnpjsync")]
#[command(about = "Synchronizes the local CNPJ/MCC store with its external sources")]
#[command(version)]
struct Cli {
    /// Data directory holding the database, ledger and downloads
    #[arg(long, env = "CNPJSYNC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(long, env = "CNPJSYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one refresh cycle against the observed source versions
    Sync {
        /// Observed registry version (dd/mm/yyyy)
        #[arg(long)]
        registry_version: Option<String>,

        /// Observed CNAE/MCC mapping spreadsheet URL
        #[arg(long)]
        mapping_version: Option<String>,

        /// Observed determined-list spreadsheet URL
        #[arg(long)]
        determined_version: Option<String>,
    },

    /// Look up one CNPJ, or every branch of an 8-digit root
    Lookup {
        /// CNPJ (any formatting) or root with --root
        query: String,

        /// Prefix match by 8-digit root instead of exact CNPJ
        #[arg(long)]
        root: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cnpjsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = SyncConfig::load(cli.config.as_deref(), cli.data_dir)
        .context("Failed to load configuration")?;
    info!("Data directory: {}", config.data_dir.display());

    let pool = init_database(&config.database_path())
        .await
        .context("Failed to open database")?;

    match cli.command {
        Command::Sync {
            registry_version,
            mapping_version,
            determined_version,
        } => {
            let mut ledger = VersionLedger::load(&config.ledger_path())
                .context("Failed to load version ledger")?;

            let probe = StaticProbe::new(registry_version, mapping_version, determined_version);
            let transport = HttpTransport::new(config.http_timeout())
                .context("Failed to build HTTP transport")?;
            let fetcher = Fetcher::new(transport, config.max_attempts);

            let outcome = run_cycle(&pool, &mut ledger, &probe, &fetcher, &config).await;

            info!(
                refreshed = outcome.refreshed.len(),
                skipped = outcome.skipped.len(),
                failed = outcome.failed.len(),
                "Refresh cycle finished"
            );
            if !outcome.is_clean() {
                let names: Vec<&str> = outcome.failed.iter().map(|(s, _)| s.key()).collect();
                anyhow::bail!("refresh failed for: {}", names.join(", "));
            }
        }

        Command::Lookup { query, root } => {
            if root {
                let rows = lookup::lookup_root(&pool, &query).await?;
                if rows.is_empty() {
                    println!("No match for root {}", cnpj::normalize_root(&query));
                } else {
                    for row in &rows {
                        print_row(row);
                    }
                }
            } else {
                match lookup::lookup_cnpj(&pool, &query).await? {
                    Some(row) => print_row(&row),
                    None => println!("CNPJ not found"),
                }
            }
        }
    }

    Ok(())
}

fn print_row(row: &LookupRow) {
    println!(
        "{}  {}  determined_mccs=[{}]  primary_mcc=[{}]  cnae={}  secondary_cnaes=[{}]",
        cnpj::format_cnpj(&row.cnpj),
        row.status_label,
        row.determined_mccs.as_deref().unwrap_or("-"),
        row.primary_mcc.as_deref().unwrap_or("-"),
        row.primary_cnae,
        row.secondary_cnaes,
    );
}
