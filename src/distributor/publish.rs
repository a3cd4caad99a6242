//! Publish state machine
//!
//! Drives a local file through
//! `Requested → Scanning → Encrypting → Publishing → Published`, with
//! `Failed` reachable from every state. Failure before the Published
//! transition never records anything in the share registry: observers can
//! only ever see a swarm identifier that is backed by a registry entry.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::security::{digest_file, encrypt_file};

use super::core::Distributor;
use super::error::DistributorError;
use super::events::{DistributorEvent, PublishFailedEvent};
use super::types::{ShareEntry, ShareStatus, SwarmId};

impl Distributor {
    /// Publish a file into a group's swarm.
    ///
    /// The source is compressed and encrypted with the group key into the
    /// share root. Directory sources are rejected: plaintext never leaves
    /// the transform, so only single files go through this path, and
    /// pre-encrypted directory trees under the share root are seeded by the
    /// reconciliation path instead. Progress is observable via the event
    /// channel; the returned identifier is already recorded in the
    /// registry.
    pub async fn publish(
        &self,
        source: &Path,
        group_id: &str,
    ) -> Result<SwarmId, DistributorError> {
        self.ensure_running().await?;
        let _guard = self.publish_lock.lock().await;

        let mut entry = self.scan_source(source).await?;
        self.emit_share_status(source, ShareStatus::Scanning).await;

        // Safety gate: the external scan verdict resolves the pending
        // record the moment it arrives.
        let scan_id = self.open_pending_scan(source).await;
        let accepted = self.membership.scan_file(source).await;
        self.close_pending_scan(scan_id, accepted).await;
        if !accepted {
            entry.status = ShareStatus::Failed;
            return Err(self
                .fail_publish(source, DistributorError::ScanRejected(source.to_path_buf()))
                .await);
        }

        // Re-share path: withdraw the prior identifier before anything else
        // so one path never has two simultaneous identifiers.
        self.withdraw_prior(&entry.published_path).await?;

        entry.status = ShareStatus::Encrypting;
        self.emit_share_status(source, ShareStatus::Encrypting).await;
        debug!(source = %source.display(), "encrypting into share root");

        let key = match self.keys.resolve_for_publish(group_id).await {
            Ok(key) => key,
            Err(e) => {
                entry.status = ShareStatus::Failed;
                return Err(self.fail_publish(source, e).await);
            }
        };

        let src = source.to_path_buf();
        let dst = entry.published_path.clone();
        let result = tokio::task::spawn_blocking(move || encrypt_file(&src, &dst, &key))
            .await
            .map_err(|e| DistributorError::Io(e.to_string()))?;
        if let Err(e) = result {
            entry.status = ShareStatus::Failed;
            return Err(self.fail_publish(source, e).await);
        }

        entry.content_digest = self.digest_artifact(&entry).await?;

        entry.status = ShareStatus::Publishing;
        self.emit_share_status(source, ShareStatus::Publishing).await;
        let transfer = match self
            .engine
            .seed(entry.published_path.clone(), &self.config.trackers)
            .await
        {
            Ok(transfer) => transfer,
            Err(e) => {
                entry.status = ShareStatus::Failed;
                return Err(self.fail_publish(source, e).await);
            }
        };
        let identifier = transfer.identifier.clone();

        // Registry update must precede the Published observable state
        self.registry
            .lock()
            .await
            .record(entry.published_path.clone(), identifier.clone());
        entry.swarm_identifier = Some(identifier.clone());
        entry.status = ShareStatus::Published;
        self.emit_share_status(source, ShareStatus::Published).await;
        self.broadcast_registry().await;

        info!(
            source = %source.display(),
            identifier = %identifier,
            "published"
        );

        self.spawn_publish_side_effects(&entry, Some(group_id.to_string()), true);
        Ok(identifier)
    }

    /// Publish one file into several groups.
    ///
    /// Each group gets its own key resolution and encryption pass; the
    /// artifact path is shared, so each pass replaces the previous seed
    /// (idempotent re-share semantics).
    pub async fn publish_to_groups(
        &self,
        source: &Path,
        groups: &[String],
    ) -> Result<Vec<SwarmId>, DistributorError> {
        let mut identifiers = Vec::with_capacity(groups.len());
        for group in groups {
            identifiers.push(self.publish(source, group).await?);
        }
        Ok(identifiers)
    }

    /// Offer an already-materialized artifact to the swarm as-is.
    ///
    /// Reconciliation path for pre-existing files under the share root:
    /// no safety scan, no transform, no metadata extraction.
    pub(crate) async fn publish_artifact(&self, path: &Path) -> Result<SwarmId, DistributorError> {
        self.ensure_running().await?;
        let _guard = self.publish_lock.lock().await;

        let mut entry = self.scan_artifact(path).await?;
        self.withdraw_prior(&entry.published_path).await?;

        entry.content_digest = self.digest_artifact(&entry).await?;

        entry.status = ShareStatus::Publishing;
        self.emit_share_status(path, ShareStatus::Publishing).await;
        let transfer = self
            .engine
            .seed(entry.published_path.clone(), &self.config.trackers)
            .await?;
        let identifier = transfer.identifier.clone();

        self.registry
            .lock()
            .await
            .record(entry.published_path.clone(), identifier.clone());
        entry.swarm_identifier = Some(identifier.clone());
        entry.status = ShareStatus::Published;
        self.emit_share_status(path, ShareStatus::Published).await;
        self.broadcast_registry().await;

        debug!(path = %path.display(), identifier = %identifier, "artifact reseeded");

        self.spawn_publish_side_effects(&entry, None, false);
        Ok(identifier)
    }

    // ========================================================================
    // Stage helpers
    // ========================================================================

    /// Scanning transition: verify the source and decide the artifact path
    async fn scan_source(&self, source: &Path) -> Result<ShareEntry, DistributorError> {
        let meta = match tokio::fs::metadata(source).await {
            Ok(meta) => meta,
            Err(_) => {
                // The file disappeared before the scan completed; skip
                debug!(source = %source.display(), "source missing at scan time");
                return Err(DistributorError::SourceMissing(source.to_path_buf()));
            }
        };
        if meta.is_dir() {
            if Self::dir_is_empty(source).await? {
                debug!(source = %source.display(), "empty directory, skipping");
                return Err(DistributorError::EmptyDirectory(source.to_path_buf()));
            }
            // Plaintext directories never enter the transform; pre-encrypted
            // trees under the share root go through the reconciliation path
            return Err(DistributorError::DirectorySource(source.to_path_buf()));
        }

        let name = source
            .file_name()
            .ok_or_else(|| DistributorError::Io(format!("bad source path: {}", source.display())))?;

        Ok(ShareEntry {
            source_path: source.to_path_buf(),
            published_path: self.config.share_root.join(name),
            content_digest: String::new(),
            swarm_identifier: None,
            is_directory: false,
            status: ShareStatus::Scanning,
        })
    }

    /// Scanning transition for the reseed path: the path is the artifact
    async fn scan_artifact(&self, path: &Path) -> Result<ShareEntry, DistributorError> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(_) => return Err(DistributorError::SourceMissing(path.to_path_buf())),
        };
        let is_directory = meta.is_dir();
        if is_directory && Self::dir_is_empty(path).await? {
            return Err(DistributorError::EmptyDirectory(path.to_path_buf()));
        }
        Ok(ShareEntry {
            source_path: path.to_path_buf(),
            published_path: path.to_path_buf(),
            content_digest: String::new(),
            swarm_identifier: None,
            is_directory,
            status: ShareStatus::Scanning,
        })
    }

    async fn dir_is_empty(path: &Path) -> Result<bool, DistributorError> {
        let mut entries = tokio::fs::read_dir(path).await?;
        Ok(entries.next_entry().await?.is_none())
    }

    /// Withdraw a prior identifier for this artifact path, if one exists.
    /// Caller must hold the publish lock.
    async fn withdraw_prior(&self, published_path: &Path) -> Result<(), DistributorError> {
        let prior = {
            let registry = self.registry.lock().await;
            registry.lookup(published_path).cloned()
        };
        if let Some(prior) = prior {
            debug!(path = %published_path.display(), "withdrawing prior share");
            self.engine.remove(&prior).await?;
            self.registry.lock().await.remove(published_path);
            self.broadcast_registry().await;
        }
        Ok(())
    }

    /// Digest the published artifact (files only; directories carry none)
    async fn digest_artifact(&self, entry: &ShareEntry) -> Result<String, DistributorError> {
        if entry.is_directory {
            return Ok(String::new());
        }
        let path = entry.published_path.clone();
        tokio::task::spawn_blocking(move || digest_file(&path))
            .await
            .map_err(|e| DistributorError::Io(e.to_string()))?
    }

    /// Mark a publish failed: emit the UI error state and pass the error on
    async fn fail_publish(&self, source: &Path, error: DistributorError) -> DistributorError {
        warn!(source = %source.display(), error = %error, "publish failed");
        self.emit_share_status(source, ShareStatus::Failed).await;
        self.emit(DistributorEvent::PublishFailed(PublishFailedEvent {
            source_path: source.to_path_buf(),
            reason: error.to_string(),
        }))
        .await;
        error
    }

    /// Fire-and-forget side effects of a successful publish: metadata
    /// indexing, membership announcement and group access registration.
    /// Failures are logged inside the services and never propagate.
    fn spawn_publish_side_effects(
        &self,
        entry: &ShareEntry,
        group_id: Option<String>,
        index_metadata: bool,
    ) {
        let membership = self.membership.clone();
        let metadata = self.metadata.clone();
        let digest = entry.content_digest.clone();
        let magnet = entry
            .swarm_identifier
            .clone()
            .unwrap_or_default();
        let source: PathBuf = entry.source_path.clone();
        let published: PathBuf = entry.published_path.clone();
        let is_directory = entry.is_directory;
        let filename = published
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        tokio::spawn(async move {
            if index_metadata {
                metadata
                    .submit(&source, &published, &magnet, is_directory, &digest)
                    .await;
            }
            membership.announce_seed(&digest, &filename, &magnet).await;
            if let Some(group) = group_id {
                if !digest.is_empty() {
                    membership.register_access(&group, &digest).await;
                }
            }
        });
    }
}
