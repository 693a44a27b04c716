//! Registry snapshot ingestion
//!
//! Streams the extracted part files line by line (the snapshot is tens of
//! gigabytes in aggregate, whole-file reads are not an option), picks the
//! four relevant fields out of each semicolon-delimited record, and bulk
//! inserts into a freshly recreated registry table.
//!
//! Record layout (0-based field offsets, quoted values):
//! - 0, 1, 2: CNPJ root, branch, check digits
//! - 5: registration status code
//! - 11: primary CNAE
//! - 12: secondary CNAEs

use cnpjsync_common::db::registry::{
    insert_registry_batch, recreate_registry_table, registry_row_count, RegistryRecord,
};
use cnpjsync_common::{Error, Result};
use encoding_rs::WINDOWS_1252;
use sqlx::SqlitePool;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Counters for one ingest run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub inserted: u64,
    pub errors: u64,
}

/// Ingest every extracted part file in `source_dir`.
///
/// The previous registry table is dropped and recreated first (the
/// upstream ships full snapshots, not deltas). A line that fails to parse
/// is counted and skipped; it never aborts the ingest.
pub async fn ingest(pool: &SqlitePool, source_dir: &Path, batch_size: usize) -> Result<IngestStats> {
    recreate_registry_table(pool).await?;

    let mut part_files = Vec::new();
    for entry in std::fs::read_dir(source_dir)? {
        let entry = entry?;
        if entry.path().extension().is_some_and(|e| e == "estabele") {
            part_files.push(entry.path());
        }
    }
    part_files.sort();

    if part_files.is_empty() {
        return Err(Error::Verification(format!(
            "no extracted part files in {}",
            source_dir.display()
        )));
    }

    let mut stats = IngestStats::default();
    let mut batch: Vec<RegistryRecord> = Vec::with_capacity(batch_size);

    for path in &part_files {
        info!(file = %path.display(), "Ingesting registry part");

        let file = tokio::fs::File::open(path).await?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf).await?;
            if n == 0 {
                break;
            }

            // Legacy single-byte Latin encoding, not UTF-8
            let (line, _, _) = WINDOWS_1252.decode(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }

            match parse_line(line) {
                Some(record) => {
                    batch.push(record);
                    stats.inserted += 1;
                    if batch.len() >= batch_size {
                        insert_registry_batch(pool, &batch).await?;
                        batch.clear();
                    }
                }
                None => stats.errors += 1,
            }
        }
    }

    if !batch.is_empty() {
        insert_registry_batch(pool, &batch).await?;
    }

    info!(
        inserted = stats.inserted,
        errors = stats.errors,
        "Registry ingest finished"
    );
    Ok(stats)
}

/// Compare the ingest counters against the rows actually in the store.
///
/// An empty or over-full table means the refresh must not be committed and
/// the downloaded artifacts must be kept for the next attempt; this is
/// what prevents wiping a good table and only partially repopulating it.
pub async fn verify(pool: &SqlitePool, stats: &IngestStats) -> Result<i64> {
    let count = registry_row_count(pool).await?;

    if count == 0 {
        return Err(Error::Verification(
            "registry table is empty after ingest".to_string(),
        ));
    }
    if count as u64 > stats.inserted {
        return Err(Error::Verification(format!(
            "registry table holds {count} rows but only {} were inserted",
            stats.inserted
        )));
    }

    let replaced = stats.inserted - count as u64;
    if replaced > 0 {
        // Snapshots repeat a CNPJ when part files overlap
        warn!(replaced, "Rows replaced by duplicate CNPJs during ingest");
    }
    info!(in_table = count, inserted = stats.inserted, "Registry ingest verified");

    Ok(count)
}

fn parse_line(line: &str) -> Option<RegistryRecord> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() < 13 {
        return None;
    }

    let unquote = |i: usize| fields[i].trim_matches('"');

    let cnpj = format!("{}{}{}", unquote(0), unquote(1), unquote(2));
    if cnpj.len() != 14 || !cnpj.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(RegistryRecord {
        cnpj,
        registration_status: unquote(5).to_string(),
        primary_cnae: unquote(11).to_string(),
        secondary_cnaes: unquote(12).to_string(),
    })
}
