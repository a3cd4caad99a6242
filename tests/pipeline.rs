//! End-to-end pipeline tests: publish and fetch through the distributor
//! with a scripted swarm engine and a mocked coordination server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use peerlink_core::security::digest_bytes;
use peerlink_core::testing::MockSwarmEngine;
use peerlink_core::{
    Distributor, DistributorConfig, DistributorError, DistributorEvent, FetchKind, FetchOutcome,
    FetchStatus, ShareStatus,
};

const TEST_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f";

/// Mock coordination server with the common happy-path endpoints mounted
async fn coordination_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/me/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/virus-scan/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"is_safe": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/shared-join/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/shared-leave/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/access/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/index-metadata/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/groups/groupkeys/.+/$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"aes_key": TEST_KEY_HEX})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/groups/keys/.+/$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"aes_key": TEST_KEY_HEX})),
        )
        .mount(&server)
        .await;
    server
}

struct Harness {
    distributor: Distributor,
    engine: Arc<MockSwarmEngine>,
    events: mpsc::Receiver<DistributorEvent>,
    root: PathBuf,
    _server: MockServer,
    _dir: tempfile::TempDir,
}

async fn start_harness() -> Harness {
    let server = coordination_server().await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();

    let config = DistributorConfig::for_testing(root.clone()).with_server_url(server.uri());
    let engine = Arc::new(MockSwarmEngine::new());
    let distributor = Distributor::start(config, engine.clone()).unwrap();
    distributor
        .set_session_tokens(Some("access".to_string()), Some("refresh".to_string()))
        .await;
    let events = distributor.events().await.unwrap();

    Harness {
        distributor,
        engine,
        events,
        root,
        _server: server,
        _dir: dir,
    }
}

fn write_source(root: &std::path::Path, name: &str, bytes: &[u8]) -> PathBuf {
    let dir = root.join("source");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Drain whatever is currently buffered on the event channel
fn drain_events(events: &mut mpsc::Receiver<DistributorEvent>) -> Vec<DistributorEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test]
async fn test_publish_encrypts_and_seeds() {
    let mut h = start_harness().await;
    let plaintext = b"quarterly numbers, do not forward".repeat(50);
    let source = write_source(&h.root, "report.pdf", &plaintext);

    let identifier = h.distributor.publish(&source, "team-alpha").await.unwrap();
    assert!(identifier.starts_with("magnet:"));

    // Artifact lives in the share root under the source's file name
    let artifact = h.root.join("shared").join("report.pdf");
    let ciphertext = std::fs::read(&artifact).unwrap();
    assert!(!ciphertext.is_empty());
    assert_ne!(ciphertext, plaintext);

    // The engine was handed the artifact, never the plaintext source
    assert_eq!(h.engine.seeded_paths().await, vec![artifact.clone()]);

    // Registry records the artifact path under the new identifier
    let shares = h.distributor.list_shares().await;
    assert_eq!(shares, vec![(artifact, identifier)]);

    let events = drain_events(&mut h.events);
    assert!(events
        .iter()
        .any(|e| matches!(e, DistributorEvent::ScanResolved { accepted: true, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, DistributorEvent::RegistryUpdated(shares) if !shares.is_empty())));

    // State machine transitions reach observers in order
    let statuses: Vec<ShareStatus> = events
        .iter()
        .filter_map(|e| match e {
            DistributorEvent::ShareStatusChanged { path, status } if *path == source => {
                Some(*status)
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            ShareStatus::Scanning,
            ShareStatus::Encrypting,
            ShareStatus::Publishing,
            ShareStatus::Published,
        ]
    );
}

#[tokio::test]
async fn test_publish_then_fetch_round_trip() {
    let mut h = start_harness().await;
    let plaintext = b"attached is the final report.pdf draft".repeat(100);
    let source = write_source(&h.root, "report.pdf", &plaintext);

    let identifier = h.distributor.publish(&source, "team-alpha").await.unwrap();
    let artifact = h.root.join("shared").join("report.pdf");
    let ciphertext = std::fs::read(&artifact).unwrap();

    // Withdraw the seed so the fetch path actually joins a swarm
    h.distributor.unshare(&artifact).await.unwrap();

    h.engine
        .expect_content("magnet:?xt=urn:inbound:1", "report.pdf", &ciphertext)
        .await;
    let outcome = h
        .distributor
        .fetch(&"magnet:?xt=urn:inbound:1".to_string(), FetchKind::UserInitiated)
        .await
        .unwrap();

    let destination = h.root.join("downloads").join("report.pdf");
    assert_eq!(
        outcome,
        FetchOutcome::Materialized {
            name: "report.pdf".to_string(),
            path: destination.clone(),
        }
    );
    assert_eq!(std::fs::read(&destination).unwrap(), plaintext);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = drain_events(&mut h.events);
    assert!(events.iter().any(
        |e| matches!(e, DistributorEvent::DownloadFinished(d) if d.name == "report.pdf" && d.path == destination)
    ));

    let statuses: Vec<FetchStatus> = events
        .iter()
        .filter_map(|e| match e {
            DistributorEvent::FetchStatusChanged { identifier, status }
                if identifier == "magnet:?xt=urn:inbound:1" =>
            {
                Some(*status)
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            FetchStatus::Fetching,
            FetchStatus::Decrypting,
            FetchStatus::Materialized,
        ]
    );
}

#[tokio::test]
async fn test_fetch_already_present_short_circuits() {
    let mut h = start_harness().await;
    h.engine
        .expect_content("magnet:dup", "notes.enc", b"ciphertext bytes")
        .await;

    let first = h
        .distributor
        .fetch(&"magnet:dup".to_string(), FetchKind::BackupSync)
        .await
        .unwrap();
    assert!(matches!(first, FetchOutcome::Materialized { .. }));

    // The engine still holds the transfer, so the duplicate trigger
    // collapses without a second join
    let second = h
        .distributor
        .fetch(&"magnet:dup".to_string(), FetchKind::BackupSync)
        .await
        .unwrap();
    assert_eq!(second, FetchOutcome::AlreadyPresent);
    assert_eq!(h.engine.joined().await.len(), 1);

    let events = drain_events(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        DistributorEvent::FetchStatusChanged {
            status: FetchStatus::AlreadyPresent,
            ..
        }
    )));
}

#[tokio::test]
async fn test_concurrent_duplicate_fetches_join_once() {
    let h = start_harness().await;
    h.engine
        .expect_content("magnet:race", "raced.enc", b"ciphertext")
        .await;
    let identifier = "magnet:race".to_string();

    // Both callers pass the presence check before either joins; the loser's
    // rejected join must resolve as already-present, not as an error
    let (a, b) = tokio::join!(
        h.distributor.fetch(&identifier, FetchKind::BackupSync),
        h.distributor.fetch(&identifier, FetchKind::BackupSync),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(h.engine.joined().await, vec![identifier]);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == FetchOutcome::AlreadyPresent)
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Materialized { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_backup_fetch_keeps_ciphertext_and_stays_silent() {
    let mut h = start_harness().await;
    h.engine
        .expect_content("magnet:backup", "other-peers-file.pdf", b"opaque ciphertext")
        .await;

    let outcome = h
        .distributor
        .fetch(&"magnet:backup".to_string(), FetchKind::BackupSync)
        .await
        .unwrap();

    // Retained encrypted in the share root, never materialized for the user
    let staged = h.root.join("shared").join("other-peers-file.pdf");
    assert_eq!(
        outcome,
        FetchOutcome::Materialized {
            name: "other-peers-file.pdf".to_string(),
            path: staged.clone(),
        }
    );
    assert_eq!(std::fs::read(&staged).unwrap(), b"opaque ciphertext");
    assert!(!h.root.join("downloads").join("other-peers-file.pdf").exists());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = drain_events(&mut h.events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, DistributorEvent::DownloadFinished(_))));
}

#[tokio::test]
async fn test_fetch_failure_cleans_up_transfer() {
    let h = start_harness().await;
    h.engine
        .expect_failure("magnet:dead", "tracker timeout")
        .await;

    let err = h
        .distributor
        .fetch(&"magnet:dead".to_string(), FetchKind::UserInitiated)
        .await
        .unwrap_err();
    assert!(matches!(err, DistributorError::SwarmEngine(_)));

    // Failed transfer is withdrawn so a retry can join again
    assert!(h.engine.active().await.is_empty());
    assert_eq!(h.engine.removed().await, vec!["magnet:dead".to_string()]);
}

#[tokio::test]
async fn test_publish_missing_source() {
    let h = start_harness().await;
    let err = h
        .distributor
        .publish(&h.root.join("source").join("gone.txt"), "team-alpha")
        .await
        .unwrap_err();
    assert!(matches!(err, DistributorError::SourceMissing(_)));
    assert!(h.engine.seeded_paths().await.is_empty());
}

#[tokio::test]
async fn test_publish_empty_directory() {
    let h = start_harness().await;
    let empty = h.root.join("source").join("empty-album");
    std::fs::create_dir_all(&empty).unwrap();

    let err = h.distributor.publish(&empty, "team-alpha").await.unwrap_err();
    assert!(matches!(err, DistributorError::EmptyDirectory(_)));
    assert!(h.distributor.list_shares().await.is_empty());
}

#[tokio::test]
async fn test_publish_directory_source_rejected() {
    let h = start_harness().await;
    let album = h.root.join("source").join("album");
    std::fs::create_dir_all(&album).unwrap();
    std::fs::write(album.join("track01.flac"), b"plaintext audio").unwrap();

    let err = h.distributor.publish(&album, "team-alpha").await.unwrap_err();
    assert!(matches!(err, DistributorError::DirectorySource(_)));

    // Plaintext never reached the swarm, the registry or the share root
    assert!(h.engine.seeded_paths().await.is_empty());
    assert!(h.distributor.list_shares().await.is_empty());
    assert!(std::fs::read_dir(h.root.join("shared"))
        .unwrap()
        .next()
        .is_none());
}

#[tokio::test]
async fn test_scan_rejection_blocks_publish() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/me/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/virus-scan/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"is_safe": false})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let config = DistributorConfig::for_testing(root.clone()).with_server_url(server.uri());
    let engine = Arc::new(MockSwarmEngine::new());
    let distributor = Distributor::start(config, engine.clone()).unwrap();
    distributor
        .set_session_tokens(Some("access".to_string()), Some("refresh".to_string()))
        .await;
    let mut events = distributor.events().await.unwrap();

    let source = write_source(&root, "suspicious.exe", b"MZ....");
    let err = distributor.publish(&source, "team-alpha").await.unwrap_err();
    assert!(matches!(err, DistributorError::ScanRejected(_)));

    // Nothing reached the swarm or the registry
    assert!(engine.seeded_paths().await.is_empty());
    assert!(distributor.list_shares().await.is_empty());
    assert!(distributor.pending_scans().await.is_empty());

    let drained = drain_events(&mut events);
    assert!(drained
        .iter()
        .any(|e| matches!(e, DistributorEvent::ScanResolved { accepted: false, .. })));
    assert!(drained
        .iter()
        .any(|e| matches!(e, DistributorEvent::PublishFailed(_))));
    assert!(drained.iter().any(|e| matches!(
        e,
        DistributorEvent::ShareStatusChanged {
            status: ShareStatus::Failed,
            ..
        }
    )));
}

#[tokio::test]
async fn test_republish_replaces_prior_identifier() {
    let h = start_harness().await;
    let source = write_source(&h.root, "notes.md", b"v1 of the notes");

    let first = h.distributor.publish(&source, "team-alpha").await.unwrap();

    std::fs::write(&source, b"v2 of the notes, now longer").unwrap();
    let second = h.distributor.publish(&source, "team-alpha").await.unwrap();

    assert_ne!(first, second);
    // One path, one identifier: the prior seed was withdrawn
    let shares = h.distributor.list_shares().await;
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].1, second);
    assert!(h.engine.removed().await.contains(&first));
}

#[tokio::test]
async fn test_unshare_withdraws_and_forgets() {
    let mut h = start_harness().await;
    let source = write_source(&h.root, "draft.txt", b"short lived share");

    let identifier = h.distributor.publish(&source, "team-alpha").await.unwrap();
    let artifact = h.root.join("shared").join("draft.txt");

    h.distributor.unshare(&artifact).await.unwrap();
    assert!(h.distributor.list_shares().await.is_empty());
    assert!(h.engine.removed().await.contains(&identifier));

    let events = drain_events(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        DistributorEvent::ShareStatusChanged {
            path,
            status: ShareStatus::Removing,
        } if *path == artifact
    )));

    let err = h.distributor.unshare(&artifact).await.unwrap_err();
    assert!(matches!(err, DistributorError::NotShared(_)));
}

#[tokio::test]
async fn test_reseed_share_root_skips_partials() {
    let h = start_harness().await;
    let shared = h.root.join("shared");
    std::fs::write(shared.join("a.bin"), b"pre-existing artifact a").unwrap();
    std::fs::write(shared.join("b.bin"), b"pre-existing artifact b").unwrap();
    std::fs::write(shared.join("c.bin.part"), b"interrupted transform").unwrap();

    let count = h.distributor.reseed_share_root().await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(h.distributor.list_shares().await.len(), 2);
    assert_eq!(h.engine.seeded_paths().await.len(), 2);
}

#[tokio::test]
async fn test_publish_announces_and_indexes() {
    let h = start_harness().await;
    let plaintext = b"content worth indexing".repeat(20);
    let source = write_source(&h.root, "album.flac", &plaintext);

    let identifier = h.distributor.publish(&source, "team-alpha").await.unwrap();

    // Side effects are fire-and-forget; give them a moment
    tokio::time::sleep(Duration::from_millis(200)).await;

    let requests = h._server.received_requests().await.unwrap();

    let join = requests
        .iter()
        .find(|r| r.url.path() == "/api/shared-join/")
        .expect("no shared-join announcement");
    let join_body: serde_json::Value = join.body_json().unwrap();
    assert_eq!(join_body["filename"], "album.flac");
    assert_eq!(join_body["magnetLink"], identifier);
    let digest = join_body["hash"].as_str().unwrap().to_string();
    let ciphertext = std::fs::read(h.root.join("shared").join("album.flac")).unwrap();
    assert_eq!(digest, digest_bytes(&ciphertext));

    let index = requests
        .iter()
        .find(|r| r.url.path() == "/api/index-metadata/")
        .expect("no metadata record");
    let index_body: serde_json::Value = index.body_json().unwrap();
    assert_eq!(index_body["filename"], "album.flac");
    assert_eq!(index_body["hash"], digest.as_str());
    assert_eq!(index_body["isDirectory"], false);
    assert_eq!(index_body["size"], plaintext.len() as u64);

    let access = requests
        .iter()
        .find(|r| r.url.path() == "/api/access/")
        .expect("no access registration");
    let access_body: serde_json::Value = access.body_json().unwrap();
    assert_eq!(access_body["group"], "team-alpha");
    assert_eq!(access_body["file_hash"], digest.as_str());
}

#[tokio::test]
async fn test_push_notifications_trigger_one_backup_fetch() {
    let server = coordination_server().await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();

    // In-process push channel: accept one subscription, push the same
    // artifact announcement twice, then hold the connection open
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let push_server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        let frame = serde_json::json!({"magnet": "magnet:pushed"}).to_string();
        ws.send(Message::Text(frame.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        ws.send(Message::Text(frame)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let config = DistributorConfig::for_testing(root.clone())
        .with_server_url(server.uri())
        .with_ws_url(format!("ws://{addr}"));
    let engine = Arc::new(MockSwarmEngine::new());
    engine
        .expect_content("magnet:pushed", "other-peers.bin", b"opaque ciphertext")
        .await;

    let distributor = Arc::new(Distributor::start(config, engine.clone()).unwrap());
    distributor
        .set_session_tokens(Some("access".to_string()), Some("refresh".to_string()))
        .await;
    distributor.start_background_tasks().await;

    // Wait for the subscription, both frames and the resulting fetch
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Duplicate notifications collapse into a single swarm join
    assert_eq!(engine.joined().await, vec!["magnet:pushed".to_string()]);
    assert_eq!(
        std::fs::read(root.join("shared").join("other-peers.bin")).unwrap(),
        b"opaque ciphertext"
    );
    assert!(!root.join("downloads").join("other-peers.bin").exists());

    distributor.shutdown().await;
    push_server.abort();
}

#[tokio::test]
async fn test_shutdown_rejects_further_operations() {
    let h = start_harness().await;
    h.distributor.shutdown().await;

    let source = write_source(&h.root, "late.txt", b"too late");
    let err = h.distributor.publish(&source, "team-alpha").await.unwrap_err();
    assert!(matches!(err, DistributorError::NotRunning));

    let err = h
        .distributor
        .fetch(&"magnet:late".to_string(), FetchKind::UserInitiated)
        .await
        .unwrap_err();
    assert!(matches!(err, DistributorError::NotRunning));
}
