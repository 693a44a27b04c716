//! End-to-end refresh-cycle tests over a fake transport

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use sqlx::SqlitePool;
use tempfile::TempDir;

use cnpjsync::fetch::{FetchError, Fetcher, Transport};
use cnpjsync::orchestrator::run_cycle;
use cnpjsync::probe::StaticProbe;
use cnpjsync::{Source, SyncConfig, VersionLedger};
use cnpjsync_common::db::init_database;
use cnpjsync_common::db::registry::registry_row_count;

const BASE_URL: &str = "http://example.test/Estabelecimentos";

/// Serves a fixed URL-to-bytes map; everything else is a 404
struct FakeTransport {
    responses: BTreeMap<String, Vec<u8>>,
    requests: AtomicU32,
}

impl FakeTransport {
    fn new(responses: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            responses,
            requests: AtomicU32::new(0),
        }
    }

    fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(url) {
            Some(bytes) => {
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            None => Err(FetchError::Exhausted(404)),
        }
    }
}

fn zip_bytes(inner_name: &str, content: &[u8]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut cursor);
    writer
        .start_file(inner_name, zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap();
    cursor.into_inner()
}

fn registry_line(root: &str, branch: &str, check: &str, status: &str) -> String {
    format!(
        "\"{root}\";\"{branch}\";\"{check}\";\"1\";\"FILIAL\";\"{status}\";\"20200101\";\"0\";\"\";\"\";\"20050101\";\"6201500\";\"6202300\";\"RUA A\";\"10\"\n"
    )
}

struct Harness {
    _dir: TempDir,
    config: SyncConfig,
    pool: SqlitePool,
    ledger: VersionLedger,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig {
            data_dir: dir.path().to_path_buf(),
            registry_base_url: BASE_URL.to_string(),
            ..SyncConfig::default()
        };
        let pool = init_database(&config.database_path()).await.unwrap();
        let ledger = VersionLedger::load(&config.ledger_path()).unwrap();
        Self {
            _dir: dir,
            config,
            pool,
            ledger,
        }
    }

    async fn cycle(&mut self, probe: &StaticProbe, transport: FakeTransport) -> cnpjsync::orchestrator::SyncOutcome {
        let fetcher = Fetcher::new(transport, 2);
        run_cycle(&self.pool, &mut self.ledger, probe, &fetcher, &self.config).await
    }
}

fn registry_responses() -> BTreeMap<String, Vec<u8>> {
    let mut lines = String::new();
    lines.push_str(&registry_line("11222333", "0001", "81", "02"));
    lines.push_str(&registry_line("34028316", "0001", "03", "02"));
    BTreeMap::from([(
        format!("{BASE_URL}0.zip"),
        zip_bytes("K3241.ESTABELE", lines.as_bytes()),
    )])
}

#[tokio::test]
async fn registry_refresh_ingests_commits_and_cleans_up() {
    let mut h = Harness::new().await;
    let probe = StaticProbe::new(Some("06/05/2024".to_string()), None, None);

    let outcome = h
        .cycle(&probe, FakeTransport::new(registry_responses()))
        .await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.refreshed, vec![Source::Registry]);
    assert_eq!(
        outcome.skipped,
        vec![Source::Mapping, Source::DeterminedList]
    );

    assert_eq!(registry_row_count(&h.pool).await.unwrap(), 2);
    // Downloaded snapshot removed after a verified ingest
    assert!(!h.config.registry_temp_dir().exists());
    // The committed version survives a ledger reload
    let reloaded = VersionLedger::load(&h.config.ledger_path()).unwrap();
    assert_eq!(reloaded.known_good(Source::Registry), "06/05/2024");
}

#[tokio::test]
async fn leftovers_from_a_failed_version_never_reach_a_later_snapshot() {
    let mut h = Harness::new().await;

    // A refresh of an earlier version failed after downloading; its
    // artifacts were kept for resume
    let old_dir = h.config.registry_temp_dir().join("05_04_2024");
    std::fs::create_dir_all(&old_dir).unwrap();
    std::fs::write(
        old_dir.join("part0_05_04_2024.estabele"),
        registry_line("11222333", "0001", "81", "02"),
    )
    .unwrap();

    // The current snapshot no longer contains that CNPJ
    let responses = BTreeMap::from([(
        format!("{BASE_URL}0.zip"),
        zip_bytes(
            "K3241.ESTABELE",
            registry_line("34028316", "0001", "03", "02").as_bytes(),
        ),
    )]);
    let probe = StaticProbe::new(Some("06/05/2024".to_string()), None, None);

    let outcome = h.cycle(&probe, FakeTransport::new(responses)).await;

    assert!(outcome.is_clean());
    let stale: Option<String> = sqlx::query_scalar("SELECT cnpj FROM registry WHERE cnpj = ?")
        .bind("11222333000181")
        .fetch_optional(&h.pool)
        .await
        .unwrap();
    assert_eq!(stale, None);
    assert_eq!(registry_row_count(&h.pool).await.unwrap(), 1);
    // The stale version's artifacts are gone with the download area
    assert!(!h.config.registry_temp_dir().exists());
}

#[tokio::test]
async fn unchanged_version_skips_without_network() {
    let mut h = Harness::new().await;
    let probe = StaticProbe::new(Some("06/05/2024".to_string()), None, None);

    let first = h
        .cycle(&probe, FakeTransport::new(registry_responses()))
        .await;
    assert_eq!(first.refreshed, vec![Source::Registry]);

    // A cycle over a dead transport can only succeed by skipping
    let second = h.cycle(&probe, FakeTransport::empty()).await;

    assert!(second.is_clean());
    assert!(second.refreshed.is_empty());
    assert_eq!(second.skipped.len(), 3);
    assert_eq!(registry_row_count(&h.pool).await.unwrap(), 2);
}

#[tokio::test]
async fn unparseable_spreadsheet_fails_source_and_keeps_ledger() {
    let mut h = Harness::new().await;
    let url = "http://example.test/depara_v12.xlsx";
    let responses = BTreeMap::from([(url.to_string(), b"not a spreadsheet".to_vec())]);
    let probe = StaticProbe::new(None, Some(url.to_string()), None);

    let outcome = h.cycle(&probe, FakeTransport::new(responses)).await;

    assert!(!outcome.is_clean());
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, Source::Mapping);

    // Ledger untouched, download kept for the next attempt
    let reloaded = VersionLedger::load(&h.config.ledger_path()).unwrap();
    assert_eq!(reloaded.known_good(Source::Mapping), "unset");
    assert!(h.config.data_dir.join("depara_v12.xlsx").exists());
}

#[tokio::test]
async fn one_failed_source_does_not_block_the_others() {
    let mut h = Harness::new().await;
    let bad_url = "http://example.test/depara_v12.xlsx";
    let mut responses = registry_responses();
    responses.insert(bad_url.to_string(), b"not a spreadsheet".to_vec());
    let probe = StaticProbe::new(
        Some("06/05/2024".to_string()),
        Some(bad_url.to_string()),
        None,
    );

    let outcome = h.cycle(&probe, FakeTransport::new(responses)).await;

    assert_eq!(outcome.refreshed, vec![Source::Registry]);
    assert_eq!(outcome.failed[0].0, Source::Mapping);
    assert_eq!(registry_row_count(&h.pool).await.unwrap(), 2);
}

#[tokio::test]
async fn disabled_updates_skip_every_source() {
    let dir = TempDir::new().unwrap();
    let config = SyncConfig {
        data_dir: dir.path().to_path_buf(),
        registry_base_url: BASE_URL.to_string(),
        ..SyncConfig::default()
    };
    std::fs::write(
        config.ledger_path(),
        "registry=unset\nmapping=unset\ndeterminedList=unset\nupdateEnabled=false\n",
    )
    .unwrap();

    let pool = init_database(&config.database_path()).await.unwrap();
    let mut ledger = VersionLedger::load(&config.ledger_path()).unwrap();
    let probe = StaticProbe::new(Some("06/05/2024".to_string()), None, None);
    let transport = FakeTransport::new(registry_responses());
    let fetcher = Fetcher::new(transport, 2);

    let outcome = run_cycle(&pool, &mut ledger, &probe, &fetcher, &config).await;

    assert!(outcome.refreshed.is_empty());
    assert_eq!(outcome.skipped.len(), 3);
    assert_eq!(fetcher.transport().request_count(), 0);
    assert_eq!(
        VersionLedger::load(&config.ledger_path())
            .unwrap()
            .known_good(Source::Registry),
        "unset"
    );
}

#[tokio::test]
async fn probe_without_answer_skips_the_source() {
    let mut h = Harness::new().await;
    let probe = StaticProbe::new(None, None, None);

    let outcome = h.cycle(&probe, FakeTransport::empty()).await;

    assert!(outcome.refreshed.is_empty());
    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.skipped.len(), 3);
}
