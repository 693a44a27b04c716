//! Service configuration
//!
//! Everything lives under one data directory: the SQLite store, the
//! version ledger, downloaded spreadsheets, and the temporary registry
//! download area. Values come from an optional TOML file with compiled
//! defaults; the data directory can be overridden from the CLI or
//! environment (handled by the binary).

use cnpjsync_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Directory holding database, ledger, and download artifacts
    pub data_dir: PathBuf,
    /// Base URL of the numbered registry part archives
    pub registry_base_url: String,
    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
    /// Bounded download attempts per file before the source is aborted
    pub max_attempts: u32,
    /// Registry rows per insert transaction
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("cnpjsync_data"),
            registry_base_url: "https://dadosabertos.rfb.gov.br/CNPJ/Estabelecimentos".to_string(),
            http_timeout_secs: 120,
            max_attempts: 3,
            batch_size: 5000,
        }
    }
}

impl SyncConfig {
    /// Load from an optional TOML file, then apply the data dir override
    pub fn load(file: Option<&Path>, data_dir_override: Option<PathBuf>) -> Result<Self> {
        let mut config = match file {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
            }
            None => SyncConfig::default(),
        };

        if let Some(dir) = data_dir_override {
            config.data_dir = dir;
        }

        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("database.db")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("versions.conf")
    }

    /// Temporary download area for registry parts; deleted after a
    /// verified ingest
    pub fn registry_temp_dir(&self) -> PathBuf {
        self.data_dir.join("temp")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
