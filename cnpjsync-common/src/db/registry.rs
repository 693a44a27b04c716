//! Registry table operations
//!
//! The upstream ships full snapshots, so every refresh drops and recreates
//! the table before bulk insertion. Inserts run in batched transactions;
//! `INSERT OR REPLACE` keeps the last occurrence when a snapshot repeats a
//! CNPJ across part files.

use crate::Result;
use sqlx::SqlitePool;

/// One parsed registry record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRecord {
    pub cnpj: String,
    pub registration_status: String,
    pub primary_cnae: String,
    pub secondary_cnaes: String,
}

/// Drop and recreate the registry table (full-snapshot replace semantics).
///
/// Guarantees no stale CNPJ survives a source that removed it.
pub async fn recreate_registry_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS registry").execute(pool).await?;
    super::init::create_registry_table(pool).await?;
    Ok(())
}

/// Insert a batch of records inside one transaction
pub async fn insert_registry_batch(pool: &SqlitePool, records: &[RegistryRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO registry (cnpj, registration_status, primary_cnae, secondary_cnaes)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.cnpj)
        .bind(&record.registration_status)
        .bind(&record.primary_cnae)
        .bind(&record.secondary_cnaes)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Count rows currently in the registry table
pub async fn registry_row_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registry")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cnpj: &str) -> RegistryRecord {
        RegistryRecord {
            cnpj: cnpj.to_string(),
            registration_status: "02".to_string(),
            primary_cnae: "6201500".to_string(),
            secondary_cnaes: String::new(),
        }
    }

    #[tokio::test]
    async fn recreate_drops_previous_rows() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        recreate_registry_table(&pool).await.unwrap();

        insert_registry_batch(&pool, &[record("11222333000181")]).await.unwrap();
        assert_eq!(registry_row_count(&pool).await.unwrap(), 1);

        recreate_registry_table(&pool).await.unwrap();
        assert_eq!(registry_row_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn replace_keeps_last_occurrence() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        recreate_registry_table(&pool).await.unwrap();

        let mut updated = record("11222333000181");
        updated.registration_status = "08".to_string();
        insert_registry_batch(&pool, &[record("11222333000181"), updated]).await.unwrap();

        assert_eq!(registry_row_count(&pool).await.unwrap(), 1);
        let status: String =
            sqlx::query_scalar("SELECT registration_status FROM registry WHERE cnpj = ?")
                .bind("11222333000181")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "08");
    }
}
