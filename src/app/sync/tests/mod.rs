//! Scenario tests for the sync state machine against a mock update service

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::app::client::{ClientConfig, ServiceEndpoint};
use crate::app::hash::Sha1Hash;
use crate::constants::messages;
use crate::errors::{ErrorKind, LaunchError, LaunchResult};

#[derive(Debug, Default)]
struct RecordingHandoff {
    installed: bool,
    fail: bool,
    calls: AtomicUsize,
}

impl Handoff for RecordingHandoff {
    fn installed(&self) -> bool {
        self.installed
    }

    fn hand_off(&self) -> LaunchResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(LaunchError::BinaryMissing {
                path: PathBuf::from("app/app"),
            })
        } else {
            Ok(())
        }
    }
}

struct Fixture {
    server: MockServer,
    temp_dir: TempDir,
    log: Arc<EventLog>,
    handoff: Arc<RecordingHandoff>,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_handoff(RecordingHandoff::default()).await
    }

    async fn with_handoff(handoff: RecordingHandoff) -> Self {
        let fixture = Self {
            server: MockServer::start().await,
            temp_dir: TempDir::new().unwrap(),
            log: Arc::new(EventLog::new()),
            handoff: Arc::new(handoff),
        };
        tokio::fs::create_dir_all(fixture.install_root()).await.unwrap();
        fixture
    }

    fn install_root(&self) -> PathBuf {
        self.temp_dir.path().join("app")
    }

    fn cache_path(&self) -> PathBuf {
        self.temp_dir.path().join(".sha1")
    }

    async fn write_local(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.install_root().join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    async fn serve_manifest(&self, entries: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .and(query_param("key", "test-key"))
            .and(query_param("os", "lin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entries))
            .mount(&self.server)
            .await;
    }

    async fn serve_item(&self, name: &str, body: &[u8], expected_requests: u64) {
        Mock::given(method("GET"))
            .and(path("/api/download"))
            .and(query_param("item", name))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .expect(expected_requests)
            .mount(&self.server)
            .await;
    }

    async fn forbid_downloads(&self) {
        Mock::given(method("GET"))
            .and(path("/api/download"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    fn orchestrator(&self) -> SyncOrchestrator {
        let endpoint = ServiceEndpoint::new(&self.server.uri(), "test-key", "lin").unwrap();
        let client = UpdateClient::new(endpoint, ClientConfig::default()).unwrap();
        SyncOrchestrator::new(client, self.log.clone(), self.handoff.clone())
    }

    async fn run(&self) -> SyncResult<SyncReport> {
        self.orchestrator()
            .run(&self.cache_path(), &self.install_root())
            .await
    }
}

fn hex(content: &[u8]) -> String {
    Sha1Hash::digest(content).to_hex()
}

#[tokio::test]
async fn test_matched_then_downloaded_trace() {
    let fixture = Fixture::new().await;
    fixture.write_local("a.txt", b"alpha").await;
    fixture
        .serve_manifest(json!([
            {"name": "a.txt", "hash": hex(b"alpha"), "size": 10},
            {"name": "b.txt", "hash": hex(b"bravo"), "size": 20},
        ]))
        .await;
    fixture.serve_item("b.txt", b"bravo", 1).await;

    let report = fixture.run().await.unwrap();

    assert_eq!(
        fixture.log.milestones(),
        vec![
            SyncEvent::SetTotalItems(2),
            SyncEvent::SameHash {
                index: 1,
                name: "a.txt".to_string(),
                hash: hex(b"alpha"),
            },
            SyncEvent::StartDownload {
                index: 2,
                name: "b.txt".to_string(),
            },
            SyncEvent::FileDownloaded {
                index: 2,
                name: "b.txt".to_string(),
                bytes: 5,
            },
            SyncEvent::Completed,
            SyncEvent::Exit,
        ]
    );

    let mut last = 0;
    for event in fixture.log.events() {
        if let SyncEvent::DownloadProgress {
            index,
            bytes,
            expected,
        } = event
        {
            assert_eq!(index, 2);
            assert_eq!(expected, 20);
            assert!(bytes >= last);
            last = bytes;
        }
    }

    assert_eq!(report.total_items, 2);
    assert_eq!(report.files_matched, 1);
    assert_eq!(report.files_downloaded, 1);
    assert_eq!(report.bytes_downloaded, 5);
    assert_eq!(report.size_mismatches, 1);
    assert!(report.launched);
    assert_eq!(fixture.handoff.calls.load(Ordering::SeqCst), 1);

    let b_path = fixture.install_root().join("b.txt");
    assert_eq!(tokio::fs::read(&b_path).await.unwrap(), b"bravo");

    let persisted = HashCache::load(fixture.cache_path()).await;
    assert_eq!(persisted.len(), 2);
    assert_eq!(
        persisted.lookup(&b_path).await,
        Some(Sha1Hash::digest(b"bravo"))
    );
    assert_eq!(
        persisted.lookup(&fixture.install_root().join("a.txt")).await,
        Some(Sha1Hash::digest(b"alpha"))
    );
}

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let fixture = Fixture::new().await;
    fixture
        .serve_manifest(json!([
            {"name": "bin/one.dll", "hash": hex(b"one"), "size": 3},
            {"name": "two.dat", "hash": hex(b"two"), "size": 3},
        ]))
        .await;
    fixture.serve_item("bin/one.dll", b"one", 1).await;
    fixture.serve_item("two.dat", b"two", 1).await;

    let first = fixture.run().await.unwrap();
    assert_eq!(first.files_downloaded, 2);

    let second = fixture.run().await.unwrap();
    assert_eq!(second.files_downloaded, 0);
    assert_eq!(second.files_matched, 2);
    assert_eq!(second.cache_hits, 2);
    assert!(second.is_up_to_date());
}

#[tokio::test]
async fn test_only_mismatching_entries_are_downloaded() {
    let fixture = Fixture::new().await;
    fixture.write_local("a", b"A").await;
    fixture.write_local("b", b"stale").await;
    fixture.write_local("c", b"C").await;
    fixture
        .serve_manifest(json!([
            {"name": "a", "hash": hex(b"A"), "size": 1},
            {"name": "b", "hash": hex(b"B"), "size": 1},
            {"name": "c", "hash": hex(b"C").to_uppercase(), "size": 1},
            {"name": "d", "hash": hex(b"D"), "size": 1},
        ]))
        .await;
    fixture.serve_item("b", b"B", 1).await;
    fixture.serve_item("d", b"D", 1).await;

    fixture.run().await.unwrap();

    let order: Vec<(usize, bool)> = fixture
        .log
        .milestones()
        .into_iter()
        .filter_map(|e| match e {
            SyncEvent::SameHash { index, .. } => Some((index, false)),
            SyncEvent::StartDownload { index, .. } => Some((index, true)),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec![(1, false), (2, true), (3, false), (4, true)]);
}

#[tokio::test]
async fn test_manifest_404_stops_without_touching_cache() {
    let fixture = Fixture::with_handoff(RecordingHandoff {
        installed: true,
        ..Default::default()
    })
    .await;
    let previous = "{\"path\":\"x\",\"mtime\":1,\"hash\":\"a9993e364706816aba3e25717850c26c9cd0d89d\"}\n";
    tokio::fs::write(fixture.cache_path(), previous).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/list"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Invalid API Key."))
        .mount(&fixture.server)
        .await;
    fixture.forbid_downloads().await;

    let error = fixture.run().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ManifestNotFound);

    assert_eq!(
        fixture.log.events(),
        vec![SyncEvent::Error {
            message: "Page not found (404). Invalid API Key.".to_string(),
            kind: ErrorKind::ManifestNotFound,
            previous_install: true,
        }]
    );
    assert_eq!(
        tokio::fs::read_to_string(fixture.cache_path()).await.unwrap(),
        previous
    );
    assert_eq!(fixture.handoff.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_directory_failure_halts_sequence() {
    let fixture = Fixture::new().await;
    // A plain file where a directory is needed
    fixture.write_local("blocked", b"not a directory").await;
    fixture
        .serve_manifest(json!([
            {"name": "blocked/a.bin", "hash": hex(b"a"), "size": 1},
            {"name": "b.bin", "hash": hex(b"b"), "size": 1},
        ]))
        .await;
    fixture.forbid_downloads().await;

    let error = fixture.run().await.unwrap_err();
    assert!(matches!(error, SyncError::CreateDirectory { .. }));
    assert_eq!(error.kind(), ErrorKind::FilePermission);

    let events = fixture.log.events();
    assert_eq!(
        events.last(),
        Some(&SyncEvent::Error {
            message: messages::CREATE_FOLDERS_FAILED.to_string(),
            kind: ErrorKind::FilePermission,
            previous_install: false,
        })
    );
    assert!(!events
        .iter()
        .any(|e| matches!(e, SyncEvent::StartDownload { .. } | SyncEvent::SameHash { .. })));
    assert!(!fixture.cache_path().exists());
}

#[tokio::test]
async fn test_download_404_stops_remaining_entries() {
    let fixture = Fixture::new().await;
    fixture
        .serve_manifest(json!([
            {"name": "a.bin", "hash": hex(b"a"), "size": 1},
            {"name": "b.bin", "hash": hex(b"b"), "size": 1},
        ]))
        .await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .and(query_param("item", "a.bin"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&fixture.server)
        .await;
    fixture.serve_item("b.bin", b"b", 0).await;

    let error = fixture.run().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::DownloadNotFound);

    let milestones = fixture.log.milestones();
    assert_eq!(
        milestones,
        vec![
            SyncEvent::SetTotalItems(2),
            SyncEvent::StartDownload {
                index: 1,
                name: "a.bin".to_string(),
            },
            SyncEvent::Error {
                message: "Page not found (404). Not Found".to_string(),
                kind: ErrorKind::DownloadNotFound,
                previous_install: false,
            },
        ]
    );
    assert!(!fixture.cache_path().exists());
}

#[tokio::test]
async fn test_unsafe_name_is_rejected() {
    let fixture = Fixture::new().await;
    fixture
        .serve_manifest(json!([
            {"name": "../outside.txt", "hash": hex(b"x"), "size": 1},
        ]))
        .await;
    fixture.forbid_downloads().await;

    let error = fixture.run().await.unwrap_err();
    assert!(matches!(error, SyncError::UnsafePath { .. }));
    assert!(!fixture.temp_dir.path().join("outside.txt").exists());
}

#[tokio::test]
async fn test_cancellation_before_run_stops_gracefully() {
    let fixture = Fixture::new().await;
    fixture
        .serve_manifest(json!([
            {"name": "a.bin", "hash": hex(b"a"), "size": 1},
        ]))
        .await;
    fixture.forbid_downloads().await;

    let shutdown = create_shutdown_token();
    shutdown.cancel();

    let mut orchestrator = fixture.orchestrator().with_shutdown(shutdown);
    let error = orchestrator
        .run(&fixture.cache_path(), &fixture.install_root())
        .await
        .unwrap_err();

    assert!(matches!(error, SyncError::Cancelled));
    assert!(matches!(
        fixture.log.events().last(),
        Some(SyncEvent::Error {
            kind: ErrorKind::Cancelled,
            ..
        })
    ));
    // A graceful stop still saves the cache
    assert!(fixture.cache_path().exists());
    assert_eq!(fixture.handoff.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_strict_size_rejects_mismatch() {
    let fixture = Fixture::new().await;
    fixture
        .serve_manifest(json!([
            {"name": "a.bin", "hash": hex(b"abc"), "size": 99},
        ]))
        .await;
    fixture.serve_item("a.bin", b"abc", 1).await;

    let mut orchestrator = fixture.orchestrator().with_options(SyncOptions {
        strict_size: true,
        launch: true,
    });
    let error = orchestrator
        .run(&fixture.cache_path(), &fixture.install_root())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        SyncError::Download(DownloadError::SizeMismatch {
            expected: 99,
            actual: 3,
            ..
        })
    ));
    assert_eq!(fixture.handoff.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_launch_option() {
    let fixture = Fixture::new().await;
    fixture.serve_manifest(json!([])).await;

    let mut orchestrator = fixture.orchestrator().with_options(SyncOptions {
        strict_size: false,
        launch: false,
    });
    let report = orchestrator
        .run(&fixture.cache_path(), &fixture.install_root())
        .await
        .unwrap();

    assert!(!report.launched);
    assert_eq!(
        fixture.log.events(),
        vec![SyncEvent::SetTotalItems(0), SyncEvent::Completed]
    );
    assert!(fixture.cache_path().exists());
}

#[tokio::test]
async fn test_launch_failure_is_reported_after_completion() {
    let fixture = Fixture::with_handoff(RecordingHandoff {
        fail: true,
        ..Default::default()
    })
    .await;
    fixture.serve_manifest(json!([])).await;

    let error = fixture.run().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::LaunchFailure);

    let events = fixture.log.events();
    assert_eq!(events[1], SyncEvent::Completed);
    assert!(matches!(events.last(), Some(SyncEvent::Error { .. })));
    assert!(fixture.cache_path().exists());
}

#[test]
fn test_resolve_destination() {
    let root = PathBuf::from("/srv/app");
    assert_eq!(
        resolve_destination(&root, "bin/core.dll").unwrap(),
        root.join("bin/core.dll")
    );
    assert_eq!(
        resolve_destination(&root, "./a.txt").unwrap(),
        root.join("a.txt")
    );
    assert_eq!(
        resolve_destination(&root, "data/./levels//one.dat").unwrap(),
        root.join("data/levels/one.dat")
    );

    for bad in ["", ".", "../a", "a/../../b", "/etc/passwd"] {
        assert!(
            matches!(
                resolve_destination(&root, bad),
                Err(SyncError::UnsafePath { .. })
            ),
            "accepted {:?}",
            bad
        );
    }
}

/// Cancels `shutdown` once entry `after` has been downloaded
struct CancelAfter {
    log: Arc<EventLog>,
    shutdown: CancellationToken,
    after: usize,
}

impl SyncObserver for CancelAfter {
    fn notify(&self, event: SyncEvent) {
        if matches!(event, SyncEvent::FileDownloaded { index, .. } if index == self.after) {
            self.shutdown.cancel();
        }
        self.log.notify(event);
    }
}

#[tokio::test]
async fn test_cancellation_mid_run_finishes_current_entry() {
    let fixture = Fixture::new().await;
    fixture
        .serve_manifest(json!([
            {"name": "a.bin", "hash": hex(b"first"), "size": 5},
            {"name": "b.bin", "hash": hex(b"second"), "size": 6},
        ]))
        .await;
    fixture.serve_item("a.bin", b"first", 1).await;
    fixture.serve_item("b.bin", b"second", 0).await;

    let shutdown = create_shutdown_token();
    let observer = Arc::new(CancelAfter {
        log: fixture.log.clone(),
        shutdown: shutdown.clone(),
        after: 1,
    });
    let endpoint = ServiceEndpoint::new(&fixture.server.uri(), "test-key", "lin").unwrap();
    let client = UpdateClient::new(endpoint, ClientConfig::default()).unwrap();
    let mut orchestrator = SyncOrchestrator::new(client, observer, fixture.handoff.clone())
        .with_shutdown(shutdown);

    let error = orchestrator
        .run(&fixture.cache_path(), &fixture.install_root())
        .await
        .unwrap_err();
    assert!(matches!(error, SyncError::Cancelled));

    // Entry 1 completed in full, entry 2 was never started
    assert_eq!(
        tokio::fs::read(fixture.install_root().join("a.bin")).await.unwrap(),
        b"first"
    );
    assert!(!fixture.install_root().join("b.bin").exists());
    assert!(!fixture
        .log
        .events()
        .iter()
        .any(|event| matches!(event, SyncEvent::StartDownload { index: 2, .. })));
    assert!(matches!(
        fixture.log.events().last(),
        Some(SyncEvent::Error {
            kind: ErrorKind::Cancelled,
            ..
        })
    ));

    // The graceful stop kept the hash of the finished download
    let cache = HashCache::load(fixture.cache_path()).await;
    assert_eq!(cache.len(), 1);
    assert_eq!(fixture.handoff.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dot_segments_share_one_cache_key() {
    let fixture = Fixture::new().await;
    fixture
        .serve_manifest(json!([
            {"name": "./a.txt", "hash": hex(b"same"), "size": 4},
        ]))
        .await;
    fixture.serve_item("./a.txt", b"same", 1).await;

    fixture.run().await.unwrap();

    let cache = HashCache::load(fixture.cache_path()).await;
    let records = cache.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].path.contains("/./"));
    assert!(records[0].path.ends_with("a.txt"));
}
