//! Refresh-cycle orchestration
//!
//! Single logical writer: the three source pipelines run sequentially with
//! respect to store mutation, because each one does a drop + recreate +
//! bulk-insert as one unit of work. A source's new version reaches the
//! ledger only after its ingest verified; a failed source keeps its ledger
//! entry and its downloaded artifacts so the next cycle resumes where this
//! one stopped. No failure path terminates the process.

use crate::config::SyncConfig;
use crate::fetch::{Fetcher, Transport};
use crate::ingest;
use crate::ledger::{Source, VersionLedger};
use crate::probe::VersionProbe;
use cnpjsync_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// What one refresh cycle did, per source
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub refreshed: Vec<Source>,
    pub skipped: Vec<Source>,
    pub failed: Vec<(Source, Error)>,
}

impl SyncOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run one refresh cycle: compare ledger versions against the probe and
/// refresh every enabled source whose version changed
pub async fn run_cycle<T: Transport, P: VersionProbe>(
    pool: &SqlitePool,
    ledger: &mut VersionLedger,
    probe: &P,
    fetcher: &Fetcher<T>,
    config: &SyncConfig,
) -> SyncOutcome {
    let mut outcome = SyncOutcome::default();

    if !ledger.is_update_enabled() {
        info!("Updates are disabled in the ledger; store left as-is");
        outcome.skipped.extend(Source::ALL);
        return outcome;
    }

    for source in Source::ALL {
        let Some(observed) = probe.observed(source) else {
            warn!(source = %source, "Version probe gave no answer, skipping source");
            outcome.skipped.push(source);
            continue;
        };

        if observed == ledger.known_good(source) {
            info!(source = %source, version = %observed, "Already synced");
            outcome.skipped.push(source);
            continue;
        }

        info!(
            source = %source,
            known_good = %ledger.known_good(source),
            observed = %observed,
            "Refresh due"
        );

        let result = match source {
            Source::Registry => refresh_registry(pool, fetcher, config, &observed).await,
            Source::Mapping => refresh_mapping(pool, fetcher, config, &observed).await,
            Source::DeterminedList => refresh_determined(pool, fetcher, config, &observed).await,
        };

        match result.and_then(|()| ledger.commit(source, &observed)) {
            Ok(()) => {
                info!(source = %source, version = %observed, "Source refreshed");
                outcome.refreshed.push(source);
            }
            Err(e) => {
                error!(source = %source, "Refresh failed, ledger left unchanged: {e}");
                outcome.failed.push((source, e));
            }
        }
    }

    outcome
}

/// Registry pipeline: resumable multi-part fetch, streamed ingest,
/// verification, then cleanup of the download area.
///
/// Each version downloads into its own subdirectory, so artifacts kept
/// from an earlier failed refresh can never be ingested as part of a
/// later version's snapshot.
async fn refresh_registry<T: Transport>(
    pool: &SqlitePool,
    fetcher: &Fetcher<T>,
    config: &SyncConfig,
    observed: &str,
) -> Result<()> {
    let temp_root = config.registry_temp_dir();
    let part_dir = temp_root.join(observed.replace('/', "_"));

    fetcher
        .fetch(&config.registry_base_url, &part_dir, observed)
        .await?;

    let stats = ingest::registry::ingest(pool, &part_dir, config.batch_size).await?;
    ingest::registry::verify(pool, &stats).await?;

    // Verified; the snapshot and any leftovers from earlier failed
    // versions are no longer needed
    tokio::fs::remove_dir_all(&temp_root).await?;
    Ok(())
}

/// Mapping pipeline: the version token is the spreadsheet URL itself
async fn refresh_mapping<T: Transport>(
    pool: &SqlitePool,
    fetcher: &Fetcher<T>,
    config: &SyncConfig,
    observed: &str,
) -> Result<()> {
    let dest = spreadsheet_path(config, observed)?;
    fetcher.fetch_file(observed, &dest).await?;

    ingest::mapping::ingest(pool, &dest).await?;

    tokio::fs::remove_file(&dest).await?;
    Ok(())
}

/// Determined-list pipeline, same shape as the mapping pipeline
async fn refresh_determined<T: Transport>(
    pool: &SqlitePool,
    fetcher: &Fetcher<T>,
    config: &SyncConfig,
    observed: &str,
) -> Result<()> {
    let dest = spreadsheet_path(config, observed)?;
    fetcher.fetch_file(observed, &dest).await?;

    ingest::determined::ingest(pool, &dest).await?;

    tokio::fs::remove_file(&dest).await?;
    Ok(())
}

/// The spreadsheet's local name is the last segment of its URL
fn spreadsheet_path(config: &SyncConfig, url: &str) -> Result<PathBuf> {
    let name = url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Config(format!("cannot derive a file name from version token {url:?}")))?;
    Ok(config.data_dir.join(name))
}
