//! Lookup queries
//!
//! Read-side contract consumed by query front-ends: exact match by
//! validated CNPJ, prefix match by 8-digit root, and batch lookup over a
//! list of raw inputs. All three project the same LEFT JOIN across the
//! registry, determined-MCC, and CNAE mapping tables.

use crate::{cnpj, Result};
use sqlx::{Row, SqlitePool};

/// Joined projection returned by every lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRow {
    pub cnpj: String,
    /// Raw registry status code (`01`, `02`, ...)
    pub status_code: String,
    /// Human-readable status label derived from the code
    pub status_label: &'static str,
    /// Determined MCCs from the card-scheme list, when present
    pub determined_mccs: Option<String>,
    /// Primary MCC mapped from the primary CNAE, when present
    pub primary_mcc: Option<String>,
    pub primary_cnae: String,
    pub secondary_cnaes: String,
}

/// Outcome of one entry in a batch lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Found(LookupRow),
    /// Validated CNPJ with no registry row
    NotFound(String),
    /// Input rejected by CNPJ validation, original input preserved
    Invalid(String),
}

/// Map a raw registration status code to its label
pub fn status_label(code: &str) -> &'static str {
    match code {
        "01" => "null/void",
        "02" => "active",
        "03" => "suspended",
        "04" => "unfit",
        "08" => "deregistered",
        _ => "unrecognized",
    }
}

const LOOKUP_PROJECTION: &str = r#"
    SELECT r.cnpj,
           r.registration_status,
           d.mcc_list,
           m.primary_mcc,
           r.primary_cnae,
           r.secondary_cnaes
    FROM registry r
    LEFT JOIN determined_mccs d ON r.cnpj = d.cnpj
    LEFT JOIN cnae_mcc_map m ON r.primary_cnae = m.cnae
"#;

fn row_to_lookup(row: &sqlx::sqlite::SqliteRow) -> LookupRow {
    let status_code: String = row.get("registration_status");
    LookupRow {
        cnpj: row.get("cnpj"),
        status_label: status_label(&status_code),
        status_code,
        determined_mccs: row.get("mcc_list"),
        primary_mcc: row.get("primary_mcc"),
        primary_cnae: row.get("primary_cnae"),
        secondary_cnaes: row.get("secondary_cnaes"),
    }
}

/// Exact lookup by CNPJ. The input is validated first; a bad identifier is
/// a typed rejection, not a crash.
pub async fn lookup_cnpj(pool: &SqlitePool, raw: &str) -> Result<Option<LookupRow>> {
    let validated = cnpj::validate(raw)?;

    let sql = format!("{LOOKUP_PROJECTION} WHERE r.cnpj = ?");
    let row = sqlx::query(&sql).bind(&validated).fetch_optional(pool).await?;

    Ok(row.as_ref().map(row_to_lookup))
}

/// Prefix lookup by 8-digit CNPJ root, ordered by status label.
///
/// Labels sort alphabetically, which puts active branches first; raw
/// status codes would invert that (`01` null/void before `02` active).
pub async fn lookup_root(pool: &SqlitePool, raw: &str) -> Result<Vec<LookupRow>> {
    let root = cnpj::normalize_root(raw);

    let sql = format!("{LOOKUP_PROJECTION} WHERE r.cnpj LIKE ?");
    let rows = sqlx::query(&sql)
        .bind(format!("{root}%"))
        .fetch_all(pool)
        .await?;

    let mut rows: Vec<LookupRow> = rows.iter().map(row_to_lookup).collect();
    rows.sort_by(|a, b| {
        a.status_label
            .cmp(b.status_label)
            .then_with(|| a.cnpj.cmp(&b.cnpj))
    });
    Ok(rows)
}

/// Batch lookup over raw inputs, one outcome per input in order
pub async fn lookup_many(pool: &SqlitePool, raws: &[String]) -> Result<Vec<BatchOutcome>> {
    let mut outcomes = Vec::with_capacity(raws.len());

    for raw in raws {
        let validated = match cnpj::validate(raw) {
            Ok(v) => v,
            Err(_) => {
                outcomes.push(BatchOutcome::Invalid(raw.clone()));
                continue;
            }
        };

        let sql = format!("{LOOKUP_PROJECTION} WHERE r.cnpj = ?");
        let row = sqlx::query(&sql).bind(&validated).fetch_optional(pool).await?;

        match row {
            Some(row) => outcomes.push(BatchOutcome::Found(row_to_lookup(&row))),
            None => outcomes.push(BatchOutcome::NotFound(validated)),
        }
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{determined, init, mapping, registry};

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init::create_registry_table(&pool).await.unwrap();
        init::create_determined_mccs_table(&pool).await.unwrap();
        init::create_cnae_mcc_map_table(&pool).await.unwrap();

        registry::insert_registry_batch(
            &pool,
            &[
                registry::RegistryRecord {
                    cnpj: "11222333000181".to_string(),
                    registration_status: "02".to_string(),
                    primary_cnae: "6201500".to_string(),
                    secondary_cnaes: "6202300,6203100".to_string(),
                },
                registry::RegistryRecord {
                    cnpj: "11222333000262".to_string(),
                    registration_status: "08".to_string(),
                    primary_cnae: "4711302".to_string(),
                    secondary_cnaes: String::new(),
                },
            ],
        )
        .await
        .unwrap();

        determined::upsert_determined(
            &pool,
            &determined::DeterminedRecord {
                cnpj: "11222333000181".to_string(),
                mcc_list: "5045,5045".to_string(),
                category: "DETERMINED".to_string(),
                determination_dates: "01/01/2024 00:00 | 01/02/2024 00:00".to_string(),
            },
        )
        .await
        .unwrap();

        mapping::upsert_mapping(
            &pool,
            &mapping::CnaeMapping {
                cnae: "6201500".to_string(),
                primary_mcc: "8742".to_string(),
                alternate_mccs: "5045".to_string(),
            },
        )
        .await
        .unwrap();

        pool
    }

    #[test]
    fn status_labels() {
        assert_eq!(status_label("01"), "null/void");
        assert_eq!(status_label("02"), "active");
        assert_eq!(status_label("03"), "suspended");
        assert_eq!(status_label("04"), "unfit");
        assert_eq!(status_label("08"), "deregistered");
        assert_eq!(status_label("99"), "unrecognized");
    }

    #[tokio::test]
    async fn exact_lookup_joins_all_sources() {
        let pool = seeded_pool().await;

        let row = lookup_cnpj(&pool, "11.222.333/0001-81").await.unwrap().unwrap();
        assert_eq!(row.cnpj, "11222333000181");
        assert_eq!(row.status_label, "active");
        assert_eq!(row.determined_mccs.as_deref(), Some("5045,5045"));
        assert_eq!(row.primary_mcc.as_deref(), Some("8742"));
        assert_eq!(row.primary_cnae, "6201500");
    }

    #[tokio::test]
    async fn exact_lookup_rejects_invalid_input() {
        let pool = seeded_pool().await;
        assert!(lookup_cnpj(&pool, "11111111111111").await.is_err());
    }

    #[tokio::test]
    async fn root_lookup_returns_all_branches() {
        let pool = seeded_pool().await;

        let rows = lookup_root(&pool, "11.222.333").await.unwrap();
        assert_eq!(rows.len(), 2);
        // Branch without determined or mapping rows still appears
        let branch = rows.iter().find(|r| r.cnpj == "11222333000262").unwrap();
        assert_eq!(branch.status_label, "deregistered");
        assert_eq!(branch.determined_mccs, None);
        assert_eq!(branch.primary_mcc, None);
    }

    #[tokio::test]
    async fn root_lookup_orders_by_status_label() {
        let pool = seeded_pool().await;
        registry::insert_registry_batch(
            &pool,
            &[registry::RegistryRecord {
                cnpj: "11222333000343".to_string(),
                registration_status: "01".to_string(),
                primary_cnae: "6201500".to_string(),
                secondary_cnaes: String::new(),
            }],
        )
        .await
        .unwrap();

        let rows = lookup_root(&pool, "11222333").await.unwrap();
        let labels: Vec<&str> = rows.iter().map(|r| r.status_label).collect();
        // Active first; the raw codes would order null/void (01) ahead
        // of active (02)
        assert_eq!(labels, vec!["active", "deregistered", "null/void"]);
    }

    #[tokio::test]
    async fn batch_lookup_reports_each_outcome() {
        let pool = seeded_pool().await;

        let outcomes = lookup_many(
            &pool,
            &[
                "11.222.333/0001-81".to_string(),
                "00000000000000".to_string(),
                "34.028.316/0001-03".to_string(),
            ],
        )
        .await
        .unwrap();

        assert!(matches!(outcomes[0], BatchOutcome::Found(_)));
        assert!(matches!(outcomes[1], BatchOutcome::Invalid(_)));
        assert!(matches!(outcomes[2], BatchOutcome::NotFound(_)));
    }
}
