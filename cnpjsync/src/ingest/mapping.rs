//! CNAE to MCC mapping ingestion
//!
//! The association's mapping spreadsheet carries one CNAE per row with a
//! primary MCC and up to 7 alternates in fixed slots. Alternates are
//! stored numerically upstream, so absent slots arrive as the zero
//! sentinel and present ones as floating-point-rendered strings.

use crate::ingest::cell_to_string;
use calamine::{open_workbook_auto, Reader};
use cnpjsync_common::db::mapping::{
    mapping_row_count, recreate_mapping_table, upsert_mapping, CnaeMapping,
};
use cnpjsync_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::info;

/// One source row from the mapping spreadsheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    pub cnae: String,
    pub primary_mcc: String,
    pub alternates: [String; 7],
}

/// Transform source rows into mapping records, one per input row.
///
/// The CNAE loses its `/` and `-` separators; alternate slots are scanned
/// in fixed order, zero sentinels skipped, the trailing `.0` float
/// artifact stripped, and survivors joined with commas. Duplicate CNAEs
/// across rows resolve last-write-wins at upsert time, not here.
pub fn map_rows(rows: Vec<MappingRow>) -> Vec<CnaeMapping> {
    rows.into_iter()
        .map(|row| {
            let cnae: String = row
                .cnae
                .chars()
                .filter(|c| *c != '/' && *c != '-')
                .collect();

            let mut alternates: Vec<String> = Vec::new();
            for slot in &row.alternates {
                let value = slot.trim();
                if value.is_empty() || value == "0" {
                    continue;
                }
                let value = value.strip_suffix(".0").unwrap_or(value);
                alternates.push(value.to_string());
            }

            CnaeMapping {
                cnae,
                primary_mcc: row.primary_mcc,
                alternate_mccs: alternates.join(","),
            }
        })
        .collect()
}

/// Read the mapping sheet: header on the second row, data columns at the
/// fixed offsets 3,5,7,..,19; empty cells become the zero sentinel
pub fn load_rows(path: &Path) -> Result<Vec<MappingRow>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Parse(format!("{}: workbook has no sheets", path.display())))?
        .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for row in range.rows().skip(2) {
        let cell = |i: usize| {
            row.get(i)
                .and_then(cell_to_string)
                .unwrap_or_else(|| "0".to_string())
        };

        let cnae = cell(3);
        if cnae == "0" {
            // Blank filler row below the table
            continue;
        }

        rows.push(MappingRow {
            cnae,
            primary_mcc: cell(5),
            alternates: [
                cell(7),
                cell(9),
                cell(11),
                cell(13),
                cell(15),
                cell(17),
                cell(19),
            ],
        });
    }

    Ok(rows)
}

/// Load, transform, and replace the CNAE/MCC mapping table.
///
/// Returns the number of rows in the table after the replace.
pub async fn ingest(pool: &SqlitePool, path: &Path) -> Result<u64> {
    let owned: PathBuf = path.to_path_buf();
    let rows = tokio::task::spawn_blocking(move || load_rows(&owned))
        .await
        .map_err(|e| Error::Parse(format!("spreadsheet load task failed: {e}")))??;

    let records = map_rows(rows);

    recreate_mapping_table(pool).await?;
    for record in &records {
        upsert_mapping(pool, record).await?;
    }

    let count = mapping_row_count(pool).await?;
    if count == 0 || count as usize > records.len() {
        return Err(Error::Verification(format!(
            "mapping table holds {count} rows from {} source rows",
            records.len()
        )));
    }

    info!(rows = count, "CNAE/MCC mapping replaced");
    Ok(count as u64)
}
