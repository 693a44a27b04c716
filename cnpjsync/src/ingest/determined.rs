//! Determined-MCC list ingestion
//!
//! The card schemes publish a flat list with one row per (CNPJ, MCC,
//! category, determination date); a CNPJ appears once per determined MCC.
//! Consolidation collapses the list into exactly one row per CNPJ before
//! the table is replaced.

use crate::ingest::cell_to_string;
use calamine::{open_workbook_auto, Reader};
use cnpjsync_common::db::determined::{
    determined_row_count, recreate_determined_table, upsert_determined, DeterminedRecord,
};
use cnpjsync_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// One source row from the determined list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminedRow {
    pub cnpj: String,
    pub mcc: String,
    pub category: String,
    pub date: String,
}

/// Collapse source rows into one consolidated record per CNPJ.
///
/// Grouping preserves first-seen order. Within a group:
/// - MCC values are joined in encounter order and are NOT deduplicated
///   (the source never dedupes values, only dates; preserved as observed)
/// - the category comes from the first row, later categories are discarded
/// - a date is appended only when it differs from the immediately
///   preceding accepted date, so two equal dates separated by a different
///   one are both kept
pub fn consolidate(rows: Vec<DeterminedRow>) -> Vec<DeterminedRecord> {
    struct Group {
        mccs: Vec<String>,
        category: String,
        dates: Vec<String>,
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();

    for row in rows {
        let cnpj = pad_cnpj(&row.cnpj);
        match groups.get_mut(&cnpj) {
            Some(group) => {
                group.mccs.push(row.mcc);
                if group.dates.last() != Some(&row.date) {
                    group.dates.push(row.date);
                }
            }
            None => {
                order.push(cnpj.clone());
                groups.insert(
                    cnpj,
                    Group {
                        mccs: vec![row.mcc],
                        category: row.category,
                        dates: vec![row.date],
                    },
                );
            }
        }
    }

    order
        .into_iter()
        .filter_map(|cnpj| {
            groups.remove(&cnpj).map(|group| DeterminedRecord {
                cnpj,
                mcc_list: group.mccs.join(","),
                category: group.category,
                determination_dates: group.dates.join(" | "),
            })
        })
        .collect()
}

/// Left-zero-pad to 14 digits. Unlike CNPJ validation this path never
/// rejects or truncates; the list is ingested as published.
fn pad_cnpj(raw: &str) -> String {
    if raw.len() >= 14 {
        return raw.to_string();
    }
    let mut padded = "0".repeat(14 - raw.len());
    padded.push_str(raw);
    padded
}

/// Read the spreadsheet's first four columns; rows with any empty cell
/// are dropped
pub fn load_rows(path: &Path) -> Result<Vec<DeterminedRow>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Parse(format!("{}: workbook has no sheets", path.display())))?
        .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for row in range.rows().skip(1) {
        let cnpj = row.first().and_then(cell_to_string);
        let mcc = row.get(1).and_then(cell_to_string);
        let category = row.get(2).and_then(cell_to_string);
        let date = row.get(3).and_then(cell_to_string);

        if let (Some(cnpj), Some(mcc), Some(category), Some(date)) = (cnpj, mcc, category, date) {
            rows.push(DeterminedRow { cnpj, mcc, category, date });
        }
    }

    Ok(rows)
}

/// Load, consolidate, and replace the determined-MCC table.
///
/// Returns the number of rows in the table after the replace; an empty or
/// inconsistent table is a verification error and the caller must not
/// commit the new version.
pub async fn ingest(pool: &SqlitePool, path: &Path) -> Result<u64> {
    let owned: PathBuf = path.to_path_buf();
    let rows = tokio::task::spawn_blocking(move || load_rows(&owned))
        .await
        .map_err(|e| Error::Parse(format!("spreadsheet load task failed: {e}")))??;

    let records = consolidate(rows);

    recreate_determined_table(pool).await?;
    for record in &records {
        upsert_determined(pool, record).await?;
    }

    let count = determined_row_count(pool).await?;
    if count == 0 || count as usize != records.len() {
        return Err(Error::Verification(format!(
            "determined-MCC table holds {count} rows, expected {}",
            records.len()
        )));
    }

    info!(rows = count, "Determined-MCC list replaced");
    Ok(count as u64)
}
