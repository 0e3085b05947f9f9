//! End-to-end pipeline runs against a real SQLite database.

use device_reporter::app;
use device_reporter::config::AppConfig;
use device_reporter::pipeline::{ChannelConfig, Pipeline};
use device_reporter::report::{ArtifactGenerator, TextReportGenerator};
use device_reporter_db::{Device, DeviceDb, FileRecord, FileStatus};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const HEADER: &str =
    "n\tmqtt\tinvid\tunit_guid\tmsg_id\ttext\tcontext\tclass\tlevel\tarea\taddr\tblock\ttype\tbit\tinvert_bit\n";

fn row(n: i64, unit: &str) -> String {
    format!("{n}\tplant/cold7\tG-044322\t{unit}\tmsg_{n}\tDefrost\t\twaiting\t100\tLOCAL\tcold7_status.Defrost_status\t\tbool\t3\t\n")
}

/// Records calls and also writes the real text report.
#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<(PathBuf, String, String, usize)>>,
}

impl ArtifactGenerator for Recording {
    fn extension(&self) -> &str {
        "txt"
    }

    fn generate(&self, output_path: &Path, group_key: &str, source_file: &str, devices: &[Device]) -> anyhow::Result<()> {
        TextReportGenerator.generate(output_path, group_key, source_file, devices)?;
        self.calls.lock().unwrap().push((
            output_path.to_path_buf(),
            group_key.to_string(),
            source_file.to_string(),
            devices.len(),
        ));
        Ok(())
    }
}

struct Harness {
    _tmp: TempDir,
    watch: PathBuf,
    reports: PathBuf,
    db: DeviceDb,
    generator: Arc<Recording>,
}

impl Harness {
    async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let watch = tmp.path().join("input");
        let reports = tmp.path().join("output");
        std::fs::create_dir_all(&watch).unwrap();
        std::fs::create_dir_all(&reports).unwrap();
        let db = DeviceDb::open(tmp.path().join("device_reporter.sqlite3")).await.unwrap();

        Self {
            _tmp: tmp,
            watch,
            reports,
            db,
            generator: Arc::new(Recording::default()),
        }
    }

    fn write(&self, name: &str, content: &str) {
        std::fs::write(self.watch.join(name), content).unwrap();
    }

    fn start(&self, cancel: &CancellationToken) -> JoinHandle<device_reporter::error::Result<()>> {
        let pipeline = Pipeline {
            watch_dir: self.watch.clone(),
            reports_dir: self.reports.clone(),
            scan_interval: Duration::from_millis(20),
            channels: ChannelConfig::default(),
            file_reader: Arc::new(self.db.clone()),
            file_writer: Arc::new(self.db.clone()),
            transactor: Arc::new(self.db.clone()),
            generator: self.generator.clone(),
        };
        tokio::spawn(pipeline.run(cancel.clone()))
    }

    async fn wait_for(&self, name: &str, status: FileStatus) -> FileRecord {
        timeout(Duration::from_secs(10), async {
            loop {
                let files = self.db.list_files().await.unwrap();
                if let Some(f) = files.into_iter().find(|f| f.name == name && f.status == status) {
                    return f;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{name} never reached {status}"))
    }

    async fn wait_for_artifacts(&self, count: usize) {
        timeout(Duration::from_secs(10), async {
            while self.generator.calls.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

async fn stop(cancel: CancellationToken, handle: JoinHandle<device_reporter::error::Result<()>>) {
    cancel.cancel();
    let result = timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
    assert!(result.is_ok(), "pipeline failed: {:?}", result);
}

#[tokio::test]
async fn test_valid_and_header_only_files() {
    let h = Harness::new().await;
    h.write("a.tsv", &format!("{HEADER}{}", row(1, "U1")));
    h.write("b.tsv", HEADER);

    let cancel = CancellationToken::new();
    let handle = h.start(&cancel);

    let a = h.wait_for("a.tsv", FileStatus::Done).await;
    let b = h.wait_for("b.tsv", FileStatus::Done).await;
    assert!(a.processed_at.is_some() && a.error_message.is_none());
    assert!(b.processed_at.is_some());
    h.wait_for_artifacts(1).await;

    // give the reporter a chance to (wrongly) emit more
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop(cancel, handle).await;

    let (devices, total) = h.db.devices_by_unit("U1", 10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(devices[0].msg_id, "msg_1");
    assert_eq!(devices[0].inv_id, "G-044322");

    let calls = h.generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, h.reports.join("U1.txt"));
    assert_eq!(calls[0].1, "U1");
    assert_eq!(calls[0].2, "a.tsv");
    assert_eq!(calls[0].3, 1);

    let report = std::fs::read_to_string(h.reports.join("U1.txt")).unwrap();
    assert!(report.contains("msg_1"));
    assert_eq!(std::fs::read_dir(&h.reports).unwrap().count(), 1);
}

#[tokio::test]
async fn test_invalid_record_marks_file_error() {
    let h = Harness::new().await;
    h.write("c.tsv", &format!("{HEADER}{}", row(0, "U1")));

    let cancel = CancellationToken::new();
    let handle = h.start(&cancel);

    let c = h.wait_for("c.tsv", FileStatus::Error).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop(cancel, handle).await;

    let message = c.error_message.unwrap();
    assert!(message.contains("#1"), "unexpected message: {message}");
    assert_eq!(message, "invalid device record #1: n is required");
    assert!(c.processed_at.is_some());

    assert_eq!(h.db.count_devices().await.unwrap(), 0);
    assert!(h.generator.calls.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(&h.reports).unwrap().count(), 0);
}

#[tokio::test]
async fn test_devices_are_grouped_per_unit() {
    let h = Harness::new().await;
    h.write(
        "mixed.tsv",
        &format!("{HEADER}{}{}{}", row(1, "U2"), row(2, "U1"), row(3, "U2")),
    );

    let cancel = CancellationToken::new();
    let handle = h.start(&cancel);

    h.wait_for("mixed.tsv", FileStatus::Done).await;
    h.wait_for_artifacts(2).await;
    stop(cancel, handle).await;

    let calls = h.generator.calls.lock().unwrap();
    let groups: Vec<(&str, usize)> = calls.iter().map(|c| (c.1.as_str(), c.3)).collect();
    assert_eq!(groups, vec![("U2", 2), ("U1", 1)]);
}

#[tokio::test]
async fn test_finished_files_are_not_reprocessed_after_restart() {
    let h = Harness::new().await;
    h.write("a.tsv", &format!("{HEADER}{}", row(1, "U1")));

    let cancel = CancellationToken::new();
    let handle = h.start(&cancel);
    h.wait_for("a.tsv", FileStatus::Done).await;
    h.wait_for_artifacts(1).await;
    stop(cancel, handle).await;

    // Second run: a.tsv is done, so only the new file is picked up
    h.write("d.tsv", &format!("{HEADER}{}", row(1, "U3")));
    let cancel = CancellationToken::new();
    let handle = h.start(&cancel);
    h.wait_for("d.tsv", FileStatus::Done).await;
    h.wait_for_artifacts(2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop(cancel, handle).await;

    assert_eq!(h.db.count_devices().await.unwrap(), 2);
    assert_eq!(h.generator.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_orphaned_processing_file_is_recovered() {
    let h = Harness::new().await;
    h.write("orphan.tsv", &format!("{HEADER}{}", row(1, "U1")));
    h.db.upsert_file(&FileRecord::processing("orphan.tsv")).await.unwrap();

    assert_eq!(h.db.reset_processing_files().await.unwrap(), 1);

    let cancel = CancellationToken::new();
    let handle = h.start(&cancel);
    h.wait_for("orphan.tsv", FileStatus::Done).await;
    stop(cancel, handle).await;

    assert_eq!(h.db.count_devices().await.unwrap(), 1);
}

#[tokio::test]
async fn test_app_run_resets_orphans_and_stops_on_cancel() {
    let tmp = TempDir::new().unwrap();
    let watch = tmp.path().join("in");
    let reports = tmp.path().join("out");
    std::fs::create_dir_all(&watch).unwrap();
    std::fs::create_dir_all(&reports).unwrap();
    std::fs::write(watch.join("orphan.tsv"), format!("{HEADER}{}", row(1, "U9"))).unwrap();

    let db_path = tmp.path().join("app.sqlite3");
    {
        let db = DeviceDb::open(&db_path).await.unwrap();
        db.upsert_file(&FileRecord::processing("orphan.tsv")).await.unwrap();
        db.close().await;
    }

    let mut config = AppConfig::default();
    config.app.watch_dir = watch;
    config.app.reports_dir = reports.clone();
    config.app.scan_interval_ms = 20;
    config.database.path = db_path.clone();

    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { app::run(&config, cancel).await }
    });

    timeout(Duration::from_secs(10), async {
        while !reports.join("U9.txt").exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    timeout(Duration::from_secs(10), run).await.unwrap().unwrap().unwrap();

    let db = DeviceDb::open_existing(&db_path).await.unwrap();
    let files = db.list_files().await.unwrap();
    assert_eq!(files[0].status, FileStatus::Done);
}

#[tokio::test]
async fn test_app_run_rejects_missing_watch_dir() {
    let tmp = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.app.watch_dir = tmp.path().join("missing");
    config.app.reports_dir = tmp.path().to_path_buf();
    config.database.path = tmp.path().join("app.sqlite3");

    let err = app::run(&config, CancellationToken::new()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("watch_dir"));
}
