//! CNAE to MCC mapping table operations

use crate::Result;
use sqlx::SqlitePool;

/// One CNAE to MCC mapping row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnaeMapping {
    /// CNAE code with `/` and `-` separators stripped
    pub cnae: String,
    pub primary_mcc: String,
    /// 0..7 alternate MCCs joined by commas, empty when none
    pub alternate_mccs: String,
}

/// Drop and recreate the mapping table (full-snapshot replace)
pub async fn recreate_mapping_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS cnae_mcc_map").execute(pool).await?;
    super::init::create_cnae_mcc_map_table(pool).await?;
    Ok(())
}

/// Upsert one mapping row; duplicate CNAE codes resolve last-write-wins
pub async fn upsert_mapping(pool: &SqlitePool, mapping: &CnaeMapping) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO cnae_mcc_map (cnae, primary_mcc, alternate_mccs)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&mapping.cnae)
    .bind(&mapping.primary_mcc)
    .bind(&mapping.alternate_mccs)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count rows currently in the mapping table
pub async fn mapping_row_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cnae_mcc_map")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
