//! Determined-MCC table operations

use crate::Result;
use sqlx::SqlitePool;

/// One consolidated determined-MCC row (exactly one per CNPJ)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminedRecord {
    pub cnpj: String,
    /// Comma-joined MCC values in first-seen order, duplicates retained
    pub mcc_list: String,
    /// Category of the first source row for this CNPJ
    pub category: String,
    /// Pipe-joined determination dates with adjacent duplicates collapsed
    pub determination_dates: String,
}

/// Drop and recreate the determined-MCC table (full-snapshot replace)
pub async fn recreate_determined_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS determined_mccs").execute(pool).await?;
    super::init::create_determined_mccs_table(pool).await?;
    Ok(())
}

/// Upsert one consolidated record
pub async fn upsert_determined(pool: &SqlitePool, record: &DeterminedRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO determined_mccs (cnpj, mcc_list, category, determination_dates)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&record.cnpj)
    .bind(&record.mcc_list)
    .bind(&record.category)
    .bind(&record.determination_dates)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count rows currently in the determined-MCC table
pub async fn determined_row_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM determined_mccs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
