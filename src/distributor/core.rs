//! Main Distributor implementation
//!
//! This is the core Distributor struct and initialization logic.
//! Implementation is split across:
//! - `distributor/` (this module): core struct, start/shutdown, public methods
//! - `distributor/publish.rs` / `distributor/fetch.rs`: the two state machines
//! - `tasks/`: background automation (membership sync, registry broadcast)

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::registry::ShareRegistry;
use crate::security::keys::KeyService;
use crate::services::{MembershipService, MetadataService, Session};
use crate::swarm::SwarmEngine;

use super::config::DistributorConfig;
use super::error::DistributorError;
use super::events::DistributorEvent;
use super::types::{FetchStatus, PendingScanRecord, ShareStatus, SwarmId};

/// The content distributor
///
/// Orchestrates the pipeline from plaintext file to encrypted, seeded
/// swarm artifact and back. This is the main entry point of the crate.
pub struct Distributor {
    /// Configuration
    pub(crate) config: DistributorConfig,
    /// Swarm engine collaborator
    pub(crate) engine: Arc<dyn SwarmEngine>,
    /// Share registry: path → identifier. Mutated only by the publish and
    /// unshare paths (single-writer); everything else takes read snapshots.
    pub(crate) registry: Arc<Mutex<ShareRegistry>>,
    /// Session token store
    pub(crate) session: Arc<Session>,
    /// Group key service client
    pub(crate) keys: KeyService,
    /// Membership/coordination service client
    pub(crate) membership: Arc<MembershipService>,
    /// Metadata extraction + indexing adapter
    pub(crate) metadata: Arc<MetadataService>,
    /// Pending safety-scan records (UI progress only)
    pending_scans: Mutex<Vec<PendingScanRecord>>,
    /// Monotonic id source for pending-scan records
    scan_seq: AtomicU64,
    /// Serializes publish/unshare mutations (single-writer contract)
    pub(crate) publish_lock: Mutex<()>,
    /// Event sender
    pub(crate) event_tx: mpsc::Sender<DistributorEvent>,
    /// Event receiver (taken once by the observer)
    event_rx: RwLock<Option<mpsc::Receiver<DistributorEvent>>>,
    /// Running flag
    pub(crate) running: Arc<RwLock<bool>>,
    /// Background tasks
    pub(crate) tasks: RwLock<Vec<tokio::task::JoinHandle<()>>>,
}

impl Distributor {
    /// Start the distributor
    ///
    /// Creates the share root and downloads directories and wires up the
    /// service clients. Background tasks are started separately via
    /// [`Distributor::start_background_tasks`].
    pub fn start(
        config: DistributorConfig,
        engine: Arc<dyn SwarmEngine>,
    ) -> Result<Self, DistributorError> {
        std::fs::create_dir_all(&config.share_root)?;
        std::fs::create_dir_all(&config.downloads_dir)?;

        let http = reqwest::Client::new();
        let session = Arc::new(Session::new(http.clone(), config.server_url.clone()));
        let keys = KeyService::new(http.clone(), config.server_url.clone());
        let membership = Arc::new(MembershipService::new(
            http.clone(),
            config.server_url.clone(),
            session.clone(),
        ));
        let metadata = Arc::new(MetadataService::new(
            http,
            config.server_url.clone(),
            config.extract_command.clone(),
            session.clone(),
        ));

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);

        info!(
            share_root = %config.share_root.display(),
            downloads = %config.downloads_dir.display(),
            "distributor started"
        );

        Ok(Self {
            config,
            engine,
            registry: Arc::new(Mutex::new(ShareRegistry::new())),
            session,
            keys,
            membership,
            metadata,
            pending_scans: Mutex::new(Vec::new()),
            scan_seq: AtomicU64::new(1),
            publish_lock: Mutex::new(()),
            event_tx,
            event_rx: RwLock::new(Some(event_rx)),
            running: Arc::new(RwLock::new(true)),
            tasks: RwLock::new(Vec::new()),
        })
    }

    /// Take the observer event receiver (available exactly once)
    pub async fn events(&self) -> Option<mpsc::Receiver<DistributorEvent>> {
        self.event_rx.write().await.take()
    }

    /// Install session tokens from the credential service
    pub async fn set_session_tokens(&self, access: Option<String>, refresh: Option<String>) {
        self.session.set_access_token(access).await;
        self.session.set_refresh_token(refresh).await;
    }

    /// Snapshot of all currently offered (path, identifier) pairs
    pub async fn list_shares(&self) -> Vec<(PathBuf, SwarmId)> {
        self.registry.lock().await.all()
    }

    /// Snapshot of files awaiting their safety-scan verdict
    pub async fn pending_scans(&self) -> Vec<PendingScanRecord> {
        self.pending_scans.lock().await.clone()
    }

    /// Withdraw a published path from the swarm and drop its registry entry
    pub async fn unshare(&self, path: &std::path::Path) -> Result<(), DistributorError> {
        self.ensure_running().await?;
        let _guard = self.publish_lock.lock().await;

        let identifier = {
            let registry = self.registry.lock().await;
            registry.lookup(path).cloned()
        };
        let Some(identifier) = identifier else {
            return Err(DistributorError::NotShared(path.to_path_buf()));
        };

        self.emit_share_status(path, ShareStatus::Removing).await;
        self.engine.remove(&identifier).await?;
        self.registry.lock().await.remove(path);
        info!(path = %path.display(), "unshared");

        self.broadcast_registry().await;
        Ok(())
    }

    /// Re-publish every pre-existing artifact under the share root.
    ///
    /// Used at startup and by filesystem-watch collaborators: the contents
    /// of the share root are already encrypted artifacts, so they are
    /// seeded as-is without re-running the scan, transform or metadata
    /// extraction. Returns the number of paths offered.
    pub async fn reseed_share_root(&self) -> Result<usize, DistributorError> {
        self.ensure_running().await?;

        let mut entries = tokio::fs::read_dir(&self.config.share_root).await?;
        let mut count = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "part").unwrap_or(false) {
                // leftover staging file from an interrupted transform
                debug!(path = %path.display(), "skipping stale partial artifact");
                continue;
            }
            match self.publish_artifact(&path).await {
                Ok(_) => count += 1,
                Err(DistributorError::SourceMissing(_))
                | Err(DistributorError::EmptyDirectory(_)) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "reseed failed for path");
                }
            }
        }
        info!(count = count, "share root reseeded");
        Ok(count)
    }

    /// Stop background tasks and leave the shared network
    pub async fn shutdown(&self) {
        info!("distributor shutting down");
        *self.running.write().await = false;

        let mut tasks = self.tasks.write().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        drop(tasks);

        // Best-effort goodbye so other members stop counting on this peer
        self.membership.leave().await;
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    pub(crate) async fn ensure_running(&self) -> Result<(), DistributorError> {
        if *self.running.read().await {
            Ok(())
        } else {
            Err(DistributorError::NotRunning)
        }
    }

    /// Send an event to the observer channel; drops the event if the
    /// observer is gone or lagging
    pub(crate) async fn emit(&self, event: DistributorEvent) {
        if self.event_tx.try_send(event).is_err() {
            debug!("observer channel full or closed, event dropped");
        }
    }

    /// Announce a publish/withdraw state transition for a path
    pub(crate) async fn emit_share_status(&self, path: &std::path::Path, status: ShareStatus) {
        self.emit(DistributorEvent::ShareStatusChanged {
            path: path.to_path_buf(),
            status,
        })
        .await;
    }

    /// Announce a fetch state transition for an identifier
    pub(crate) async fn emit_fetch_status(&self, identifier: &SwarmId, status: FetchStatus) {
        self.emit(DistributorEvent::FetchStatusChanged {
            identifier: identifier.clone(),
            status,
        })
        .await;
    }

    /// Broadcast the current registry snapshot to observers
    pub(crate) async fn broadcast_registry(&self) {
        let snapshot = self.registry.lock().await.all();
        self.emit(DistributorEvent::RegistryUpdated(snapshot)).await;
    }

    /// Create a pending-scan record and announce it
    pub(crate) async fn open_pending_scan(&self, path: &std::path::Path) -> u64 {
        let id = self.scan_seq.fetch_add(1, Ordering::Relaxed);
        let record = PendingScanRecord {
            id,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_path: path.to_path_buf(),
            status: "scanning".to_string(),
        };
        self.pending_scans.lock().await.push(record.clone());
        self.emit(DistributorEvent::ScanStarted(record)).await;
        id
    }

    /// Destroy a pending-scan record the instant the verdict arrives
    pub(crate) async fn close_pending_scan(&self, id: u64, accepted: bool) {
        self.pending_scans.lock().await.retain(|r| r.id != id);
        self.emit(DistributorEvent::ScanResolved { id, accepted }).await;
    }
}
