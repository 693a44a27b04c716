//! Database initialization
//!
//! Creates the SQLite store on first run and ensures the three source
//! tables exist. Each table is keyed by the identifier the lookup joins on
//! and is fully replaced by its ingest pipeline on refresh, so the schema
//! here is deliberately flat.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize the database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL keeps lookups readable while an ingest is writing
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_registry_table(&pool).await?;
    create_determined_mccs_table(&pool).await?;
    create_cnae_mcc_map_table(&pool).await?;

    Ok(pool)
}

/// Create the registry table
///
/// One row per CNPJ from the government business-registry snapshot.
pub async fn create_registry_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS registry (
            cnpj TEXT PRIMARY KEY,
            registration_status TEXT,
            primary_cnae TEXT,
            secondary_cnaes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the determined-MCC table
///
/// One consolidated row per CNPJ from the card-scheme determined list.
pub async fn create_determined_mccs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS determined_mccs (
            cnpj TEXT PRIMARY KEY,
            mcc_list TEXT,
            category TEXT,
            determination_dates TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the CNAE to MCC mapping table
pub async fn create_cnae_mcc_map_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cnae_mcc_map (
            cnae TEXT PRIMARY KEY,
            primary_mcc TEXT,
            alternate_mccs TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
