//! Resumable multi-part fetcher
//!
//! The registry publishes an unknown number of numbered zip archives
//! (`...0.zip`, `...1.zip`, ...) without a part count, so the fetcher walks
//! indices upward until the source reports there is no next part. Every
//! part already present on disk (as archive or extracted file) is skipped,
//! which makes an interrupted run resumable from where it stopped.
//!
//! Downloads land in a `.tmp` sibling and are renamed into place, so a
//! crash never leaves a file that looks complete. Stale `.tmp` artifacts
//! from a previous crashed run are deleted before any work.

use cnpjsync_common::{Error, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Extension given to the single file extracted from each part archive
const EXTRACTED_EXTENSION: &str = "estabele";

/// Fetch-local failure taxonomy. `Exhausted` is the normal end of the
/// open-ended part protocol and must stay distinct from a network that is
/// down, so callers can tell "no more parts" from "try again later".
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("source exhausted (HTTP {0})")]
    Exhausted(u16),

    #[error("transient network failure: {0}")]
    Transient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-stream transport for one URL to one destination file.
///
/// Production uses [`HttpTransport`]; tests drive the part loop with fakes.
pub trait Transport {
    fn download(
        &self,
        url: &str,
        dest: &Path,
    ) -> impl std::future::Future<Output = std::result::Result<(), FetchError>> + Send;
}

/// reqwest-backed transport with a per-request timeout
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn download(&self, url: &str, dest: &Path) -> std::result::Result<(), FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            // The registry answers 404 past the last published part
            return Err(FetchError::Exhausted(status.as_u16()));
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!("HTTP {status} for {url}")));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Transient(e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}

/// Resumable fetcher with a bounded per-download retry budget
pub struct Fetcher<T> {
    transport: T,
    max_attempts: u32,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, max_attempts: u32) -> Self {
        Self {
            transport,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Download and extract every published part of a multi-part source.
    ///
    /// Returns the number of parts present in `target_dir` afterwards.
    /// Calling this twice with the same arguments performs zero network
    /// requests the second time and leaves the directory byte-identical:
    /// a completion marker is written once the source reports exhaustion,
    /// because the part count is otherwise unknowable without re-probing.
    /// A run that found zero parts writes no marker and re-probes next
    /// time.
    pub async fn fetch(&self, base_url: &str, target_dir: &Path, version_tag: &str) -> Result<u32> {
        tokio::fs::create_dir_all(target_dir).await?;

        let tag = version_tag.replace('/', "_");
        let marker = target_dir.join(format!(".complete_{tag}"));
        if marker.exists() {
            let parts = count_extracted(target_dir)?;
            info!(
                parts,
                dir = %target_dir.display(),
                "Fetch already complete for this version, skipping"
            );
            return Ok(parts);
        }

        remove_stale_tmp_files(target_dir)?;

        let mut index: u32 = 0;
        loop {
            let zip_path = target_dir.join(format!("part{index}_{tag}.zip"));
            let extracted = zip_path.with_extension(EXTRACTED_EXTENSION);
            if zip_path.exists() || extracted.exists() {
                debug!(index, "Part already on disk, skipping download");
                index += 1;
                continue;
            }

            let url = format!("{base_url}{index}.zip");
            let tmp = tmp_sibling(&zip_path);
            match self.download_with_retry(&url, &tmp).await {
                Ok(()) => {
                    tokio::fs::rename(&tmp, &zip_path).await?;
                    info!(index, url = %url, "Downloaded part");
                    index += 1;
                }
                Err(FetchError::Exhausted(status)) => {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    debug!(index, status, "No further parts published");
                    break;
                }
                Err(FetchError::Transient(msg)) => {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(Error::Network(msg));
                }
                Err(FetchError::Io(e)) => {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(e.into());
                }
            }
        }

        extract_archives(target_dir).await?;

        // An exhaustion answer at part 0 may be a publisher hiccup;
        // without the marker the next run re-probes the source
        if index > 0 {
            tokio::fs::write(&marker, b"").await?;
        }
        Ok(index)
    }

    /// Download a single file (the spreadsheet sources), skipping when the
    /// destination already exists
    pub async fn fetch_file(&self, url: &str, dest: &Path) -> Result<()> {
        if dest.exists() {
            info!(dest = %dest.display(), "File already downloaded, skipping");
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = tmp_sibling(dest);
        match self.download_with_retry(url, &tmp).await {
            Ok(()) => {
                tokio::fs::rename(&tmp, dest).await?;
                info!(url = %url, "Downloaded file");
                Ok(())
            }
            Err(FetchError::Exhausted(status)) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(Error::Network(format!("HTTP {status} for {url}")))
            }
            Err(FetchError::Transient(msg)) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(Error::Network(msg))
            }
            Err(FetchError::Io(e)) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(e.into())
            }
        }
    }

    /// Bounded-attempt retry loop; only transient failures are retried
    async fn download_with_retry(
        &self,
        url: &str,
        dest: &Path,
    ) -> std::result::Result<(), FetchError> {
        let mut attempt = 1;
        loop {
            match self.transport.download(url, dest).await {
                Ok(()) => return Ok(()),
                Err(FetchError::Transient(msg)) if attempt < self.max_attempts => {
                    warn!(url = %url, attempt, "Transient download failure, retrying: {msg}");
                    let _ = tokio::fs::remove_file(dest).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A previous crashed run must not block retries
fn remove_stale_tmp_files(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(".tmp") {
            warn!(file = %entry.path().display(), "Removing stale partial download");
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn count_extracted(dir: &Path) -> Result<u32> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().extension().is_some_and(|e| e == EXTRACTED_EXTENSION) {
            count += 1;
        }
    }
    Ok(count)
}

/// Extract every archive whose decompressed sibling does not yet exist,
/// then delete the archive. Each part holds exactly one inner file, which
/// is renamed to the part's name with the fixed extension.
async fn extract_archives(dir: &Path) -> Result<()> {
    let mut archives = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().extension().is_some_and(|e| e == "zip") {
            archives.push(entry.path());
        }
    }
    archives.sort();

    for zip_path in archives {
        let extracted = zip_path.with_extension(EXTRACTED_EXTENSION);
        if extracted.exists() {
            tokio::fs::remove_file(&zip_path).await?;
            continue;
        }

        let tmp = tmp_sibling(&extracted);
        let zip_clone = zip_path.clone();
        let tmp_clone = tmp.clone();
        // CPU/I/O-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || extract_single_entry(&zip_clone, &tmp_clone))
            .await
            .map_err(|e| Error::Parse(format!("extraction task failed: {e}")))??;

        tokio::fs::rename(&tmp, &extracted).await?;
        tokio::fs::remove_file(&zip_path).await?;
        info!(file = %extracted.display(), "Extracted part");
    }

    Ok(())
}

fn extract_single_entry(zip_path: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::Parse(format!("{}: {e}", zip_path.display())))?;
    if archive.len() == 0 {
        return Err(Error::Parse(format!("{}: empty archive", zip_path.display())));
    }

    let mut entry = archive
        .by_index(0)
        .map_err(|e| Error::Parse(format!("{}: {e}", zip_path.display())))?;
    let mut out = std::fs::File::create(dest)?;
    std::io::copy(&mut entry, &mut out)?;

    Ok(())
}
