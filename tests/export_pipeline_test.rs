//! End-to-end tests of the export pipeline
//!
//! Each test drives a [`TarExporter`] against an in-process session and
//! reads the delivered archive back with the `tar` crate.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};
use tar_exporter::adapters::fs::{Filesystem, MemFs};
use tar_exporter::adapters::{
    Cleanup, CreateFsRequest, FsFactory, LocalCaller, LocalFsFactory, LocalRef,
    LocalSessionManager, MemRef, SharedBuffer, SinkTarget, TarStreamWriter, TracingProgress,
};
use tar_exporter::core::cancel::Cancellation;
use tar_exporter::core::export::{ExporterOpt, Layout, TarExporter};
use tar_exporter::domain::{
    ExportSource, ExporterError, Platform, PlatformId, Platforms, SessionId,
    PLATFORMS_METADATA_KEY,
};
use tokio::sync::watch;

const EPOCH: u64 = 1_700_000_000;

/// Factory that records every construction and the order of releases
#[derive(Default)]
struct RecordingFactory {
    calls: AtomicUsize,
    released: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
}

impl RecordingFactory {
    fn failing_on(key: &str) -> Self {
        Self {
            fail_on: Some(key.to_string()),
            ..Self::default()
        }
    }

    fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl FsFactory for RecordingFactory {
    async fn create_fs(
        &self,
        request: CreateFsRequest<'_>,
    ) -> tar_exporter::domain::Result<(Arc<dyn Filesystem>, Option<Cleanup>)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_deref() == Some(request.key) {
            return Err(ExporterError::Other("content unavailable".to_string()));
        }
        let key = request.key.to_string();
        let released = self.released.clone();
        let cleanup: Cleanup = Box::new(move || {
            released.lock().unwrap().push(key);
            Ok(())
        });
        Ok((Arc::new(MemFs::new()), Some(cleanup)))
    }
}

struct Harness {
    sessions: Arc<LocalSessionManager>,
    session_id: SessionId,
    buffer: SharedBuffer,
}

impl Harness {
    fn connected() -> Self {
        let sessions = Arc::new(LocalSessionManager::new());
        let session_id = SessionId::generate();
        let buffer = SharedBuffer::new();
        sessions.register(Arc::new(LocalCaller::new(
            session_id.clone(),
            SinkTarget::Buffer(buffer.clone()),
        )));
        Self {
            sessions,
            session_id,
            buffer,
        }
    }

    fn exporter(&self, factory: Arc<dyn FsFactory>) -> TarExporter {
        TarExporter::new(ExporterOpt::new(
            self.sessions.clone(),
            factory,
            Arc::new(TarStreamWriter::new()),
            Arc::new(TracingProgress::new()),
        ))
    }

    /// Entry name, mtime and contents of every archive member
    fn entries(&self) -> Vec<(String, u64, Vec<u8>)> {
        let bytes = self.buffer.contents();
        let mut archive = tar::Archive::new(bytes.as_slice());
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
                let mtime = entry.header().mtime().unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (name, mtime, data)
            })
            .collect()
    }
}

fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn mem_ref(id: &str, file: &str, contents: &str) -> Arc<MemRef> {
    let mut fs = MemFs::new();
    fs.add_file(file, contents, 0o644);
    Arc::new(MemRef::new(id, fs))
}

fn platform_source(ids: &[&str]) -> ExportSource {
    let mut source = ExportSource::empty();
    for id in ids {
        let platform: Platform = id.parse().unwrap();
        source = source
            .with_platform(
                PlatformId::new(*id).unwrap(),
                platform,
                mem_ref(id, "app", id),
            )
            .unwrap();
    }
    source
}

#[tokio::test]
async fn test_single_ref_exports_flat_tree_with_original_mtimes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hello").unwrap();
    std::fs::create_dir(dir.path().join("lib")).unwrap();
    std::fs::write(dir.path().join("lib").join("a.so"), "elf").unwrap();
    let expected_mtime = std::fs::metadata(dir.path().join("hello.txt"))
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let harness = Harness::connected();
    let summary = harness
        .exporter(Arc::new(LocalFsFactory::new()))
        .resolve(HashMap::new())
        .unwrap()
        .export(
            &ExportSource::single(Arc::new(LocalRef::new("build", dir.path()))),
            &harness.session_id,
            &Cancellation::never(),
        )
        .await
        .unwrap();

    assert_eq!(summary.layout, Layout::Flat);
    assert!(summary.epoch.is_none());

    let entries = harness.entries();
    let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
    assert!(names.contains(&"hello.txt"));
    assert!(names.contains(&"lib/"));
    assert!(names.contains(&"lib/a.so"));
    assert!(names.iter().all(|n| !n.starts_with('/')));

    let (_, mtime, data) = entries.iter().find(|(n, _, _)| n == "hello.txt").unwrap();
    assert_eq!(*mtime, expected_mtime);
    assert_eq!(data, b"hello");
}

#[tokio::test]
async fn test_forced_map_exports_one_directory_per_platform() {
    let harness = Harness::connected();
    let epoch = EPOCH.to_string();
    let summary = harness
        .exporter(Arc::new(LocalFsFactory::new()))
        .resolve(attrs(&[
            ("multi-platform", "true"),
            ("source-date-epoch", &epoch),
        ]))
        .unwrap()
        .export(
            &platform_source(&["linux/amd64", "linux/arm64"]),
            &harness.session_id,
            &Cancellation::never(),
        )
        .await
        .unwrap();

    assert_eq!(summary.layout, Layout::Nested);
    assert_eq!(summary.directories, vec!["linux_amd64", "linux_arm64"]);

    let entries = harness.entries();
    let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "linux_amd64/",
            "linux_amd64/app",
            "linux_arm64/",
            "linux_arm64/app"
        ]
    );
    assert!(entries.iter().all(|(_, mtime, _)| *mtime == EPOCH));
    assert_eq!(entries[3].2, b"linux/arm64");
}

#[tokio::test]
async fn test_declared_platforms_use_map_by_default() {
    let harness = Harness::connected();
    let summary = harness
        .exporter(Arc::new(LocalFsFactory::new()))
        .resolve(HashMap::new())
        .unwrap()
        .export(
            &platform_source(&["linux/arm64", "linux/amd64"]),
            &harness.session_id,
            &Cancellation::never(),
        )
        .await
        .unwrap();

    assert_eq!(summary.layout, Layout::Nested);
    assert_eq!(summary.directories, vec!["linux_arm64", "linux_amd64"]);
}

#[tokio::test]
async fn test_disabling_map_with_several_platforms_fails() {
    let harness = Harness::connected();
    let factory = Arc::new(RecordingFactory::default());
    let err = harness
        .exporter(factory.clone())
        .resolve(attrs(&[("multi-platform", "false")]))
        .unwrap()
        .export(
            &platform_source(&["linux/amd64", "linux/arm64"]),
            &harness.session_id,
            &Cancellation::never(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExporterError::MultiplePlatformsWithoutMap));
    assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
    assert!(harness.buffer.contents().is_empty());
}

#[tokio::test]
async fn test_missing_ref_fails_before_any_materialization() {
    let mut platforms = Platforms::new();
    for id in ["linux/amd64", "linux/arm64"] {
        platforms.push(PlatformId::new(id).unwrap(), id.parse().unwrap());
    }
    let mut source = ExportSource::empty()
        .with_metadata(PLATFORMS_METADATA_KEY, platforms.to_bytes().unwrap());
    source.refs.insert(
        PlatformId::new("linux/amd64").unwrap(),
        mem_ref("amd64", "app", "x"),
    );

    let harness = Harness::connected();
    let factory = Arc::new(RecordingFactory::default());
    let err = harness
        .exporter(factory.clone())
        .resolve(HashMap::new())
        .unwrap()
        .export(&source, &harness.session_id, &Cancellation::never())
        .await
        .unwrap_err();

    match err {
        ExporterError::MissingRef(id) => assert_eq!(id, "linux/arm64"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cleanups_run_in_reverse_order_after_success() {
    let harness = Harness::connected();
    let factory = Arc::new(RecordingFactory::default());
    harness
        .exporter(factory.clone())
        .resolve(HashMap::new())
        .unwrap()
        .export(
            &platform_source(&["linux/amd64", "linux/arm64", "linux/arm/v7"]),
            &harness.session_id,
            &Cancellation::never(),
        )
        .await
        .unwrap();

    assert_eq!(
        factory.released(),
        vec!["linux/arm/v7", "linux/arm64", "linux/amd64"]
    );
}

#[tokio::test]
async fn test_cleanups_run_in_reverse_order_after_materialization_failure() {
    let harness = Harness::connected();
    let factory = Arc::new(RecordingFactory::failing_on("linux/arm/v7"));
    let err = harness
        .exporter(factory.clone())
        .resolve(HashMap::new())
        .unwrap()
        .export(
            &platform_source(&["linux/amd64", "linux/arm64", "linux/arm/v7"]),
            &harness.session_id,
            &Cancellation::never(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExporterError::Materialize { .. }));
    assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
    assert_eq!(factory.released(), vec!["linux/arm64", "linux/amd64"]);
    assert!(harness.buffer.contents().is_empty());
}

#[tokio::test]
async fn test_connect_timeout_writes_nothing_and_releases() {
    let harness = Harness::connected();
    let factory = Arc::new(RecordingFactory::default());
    let mut opt = ExporterOpt::new(
        harness.sessions.clone(),
        factory.clone(),
        Arc::new(TarStreamWriter::new()),
        Arc::new(TracingProgress::new()),
    );
    opt.connect_timeout = Duration::from_millis(20);

    let err = TarExporter::new(opt)
        .resolve(HashMap::new())
        .unwrap()
        .export(
            &platform_source(&["linux/amd64"]),
            &SessionId::new("never-connects").unwrap(),
            &Cancellation::never(),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(factory.released(), vec!["linux/amd64"]);
    assert!(harness.buffer.contents().is_empty());
    assert_eq!(harness.buffer.close_count(), 0);
}

#[tokio::test]
async fn test_cancelled_export_releases_and_writes_nothing() {
    let harness = Harness::connected();
    let factory = Arc::new(RecordingFactory::default());
    let (_tx, rx) = watch::channel(true);

    let err = harness
        .exporter(factory.clone())
        .resolve(HashMap::new())
        .unwrap()
        .export(
            &platform_source(&["linux/amd64"]),
            &harness.session_id,
            &Cancellation::new(rx),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
    assert!(harness.buffer.contents().is_empty());
}

#[tokio::test]
async fn test_cancellation_while_connecting_releases_every_mount() {
    let harness = Harness::connected();
    let factory = Arc::new(RecordingFactory::default());
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = tx.send(true);
    });

    let err = harness
        .exporter(factory.clone())
        .resolve(HashMap::new())
        .unwrap()
        .export(
            &platform_source(&["linux/amd64", "linux/arm64", "linux/arm/v7"]),
            &SessionId::new("not-yet-connected").unwrap(),
            &Cancellation::new(rx),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        factory.released(),
        vec!["linux/arm/v7", "linux/arm64", "linux/amd64"]
    );
    assert!(harness.buffer.contents().is_empty());
    assert_eq!(harness.buffer.close_count(), 0);
}

#[tokio::test]
async fn test_present_but_empty_descriptor_exports_empty_archive() {
    for descriptor in [br#"{"Platforms":[]}"#.to_vec(), Vec::new()] {
        let harness = Harness::connected();
        let mut source =
            ExportSource::empty().with_metadata(PLATFORMS_METADATA_KEY, descriptor);
        source.refs.insert(
            PlatformId::new("linux/amd64").unwrap(),
            mem_ref("linux/amd64", "app", "amd64"),
        );

        let summary = harness
            .exporter(Arc::new(LocalFsFactory::new()))
            .resolve(HashMap::new())
            .unwrap()
            .export(&source, &harness.session_id, &Cancellation::never())
            .await
            .unwrap();

        assert_eq!(summary.layout, Layout::Nested);
        assert!(summary.directories.is_empty());
        let bytes = harness.buffer.contents();
        assert_eq!(bytes.len(), 1024);
        assert!(bytes.iter().all(|b| *b == 0));
        assert_eq!(summary.bytes_written, 1024);
    }
}

#[tokio::test]
async fn test_empty_result_sends_bare_trailer() {
    let harness = Harness::connected();
    let summary = harness
        .exporter(Arc::new(LocalFsFactory::new()))
        .resolve(HashMap::new())
        .unwrap()
        .export(
            &ExportSource::empty(),
            &harness.session_id,
            &Cancellation::never(),
        )
        .await
        .unwrap();

    let bytes = harness.buffer.contents();
    assert_eq!(bytes.len(), 1024);
    assert!(bytes.iter().all(|b| *b == 0));
    assert_eq!(summary.bytes_written, 1024);
    assert_eq!(harness.buffer.close_count(), 1);
}

#[tokio::test]
async fn test_identical_inputs_with_epoch_encode_identically() {
    let epoch = EPOCH.to_string();
    let mut outputs = Vec::new();
    for _ in 0..2 {
        let harness = Harness::connected();
        harness
            .exporter(Arc::new(LocalFsFactory::new()))
            .resolve(attrs(&[("source-date-epoch", &epoch)]))
            .unwrap()
            .export(
                &platform_source(&["linux/amd64", "linux/arm64"]),
                &harness.session_id,
                &Cancellation::never(),
            )
            .await
            .unwrap();
        outputs.push(harness.buffer.contents());
    }
    assert_eq!(outputs[0], outputs[1]);
}
