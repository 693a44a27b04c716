//! Version ledger
//!
//! Persisted `key=value` record of which source version the local store
//! currently reflects, plus the update-enabled flag. This file is the
//! source of truth for "is a refresh due"; a corrupted ledger is a fatal
//! configuration error because silently defaulting it could either force a
//! full re-download or, worse, fake an "already synced" state.

use cnpjsync_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Version value written before a source was ever synced
pub const UNSET_VERSION: &str = "unset";

/// One of the three external data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// Government business-registry dump
    Registry,
    /// Card-scheme CNAE/MCC mapping spreadsheet
    Mapping,
    /// Card-scheme determined-MCC list spreadsheet
    DeterminedList,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Registry, Source::Mapping, Source::DeterminedList];

    /// Ledger key for this source
    pub fn key(self) -> &'static str {
        match self {
            Source::Registry => "registry",
            Source::Mapping => "mapping",
            Source::DeterminedList => "determinedList",
        }
    }

    fn from_key(key: &str) -> Option<Source> {
        match key {
            "registry" => Some(Source::Registry),
            "mapping" => Some(Source::Mapping),
            "determinedList" => Some(Source::DeterminedList),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Persisted map of source name to known-good version
#[derive(Debug)]
pub struct VersionLedger {
    path: PathBuf,
    versions: BTreeMap<Source, String>,
    update_enabled: bool,
}

impl VersionLedger {
    /// Load the ledger, creating it with sentinel versions on first run
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let ledger = VersionLedger {
                path: path.to_path_buf(),
                versions: Source::ALL
                    .iter()
                    .map(|&s| (s, UNSET_VERSION.to_string()))
                    .collect(),
                update_enabled: true,
            };
            ledger.persist()?;
            info!("Created new version ledger: {}", path.display());
            return Ok(ledger);
        }

        let content = std::fs::read_to_string(path)?;
        let mut versions = BTreeMap::new();
        let mut update_enabled: Option<bool> = None;

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::Config(format!("malformed ledger line (missing '='): {line:?}"))
            })?;

            if key == "updateEnabled" {
                update_enabled = Some(parse_enabled(value));
            } else if let Some(source) = Source::from_key(key) {
                versions.insert(source, value.trim_end().to_string());
            } else {
                return Err(Error::Config(format!("unknown ledger key: {key:?}")));
            }
        }

        for source in Source::ALL {
            if !versions.contains_key(&source) {
                return Err(Error::Config(format!(
                    "ledger is missing the '{}' entry",
                    source.key()
                )));
            }
        }
        let update_enabled = update_enabled
            .ok_or_else(|| Error::Config("ledger is missing the 'updateEnabled' entry".into()))?;

        Ok(VersionLedger {
            path: path.to_path_buf(),
            versions,
            update_enabled,
        })
    }

    /// Version the local store currently reflects for a source
    pub fn known_good(&self, source: Source) -> &str {
        self.versions
            .get(&source)
            .map(String::as_str)
            .unwrap_or(UNSET_VERSION)
    }

    pub fn is_update_enabled(&self) -> bool {
        self.update_enabled
    }

    /// Record a verified successful ingest of `version` for `source`.
    ///
    /// Persists atomically (temp file + rename); a crash mid-commit never
    /// leaves a partially written ledger.
    pub fn commit(&mut self, source: Source, version: &str) -> Result<()> {
        self.versions.insert(source, version.to_string());
        self.persist()?;
        info!(source = %source, version = %version, "Committed ledger version");
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let mut content = String::new();
        for source in Source::ALL {
            content.push_str(source.key());
            content.push('=');
            content.push_str(self.known_good(source));
            content.push('\n');
        }
        content.push_str("updateEnabled=");
        content.push_str(if self.update_enabled { "true" } else { "false" });
        content.push('\n');

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// The original config file used `Sim`/`sim`/`S`/`s` for "yes"; accept
/// those on read, write canonical `true`/`false`.
fn parse_enabled(value: &str) -> bool {
    matches!(value.trim(), "true" | "Sim" | "sim" | "S" | "s")
}
