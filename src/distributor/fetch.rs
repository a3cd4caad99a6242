//! Fetch state machine
//!
//! Drives an inbound identifier through
//! `Requested → (AlreadyPresent) | Fetching → Decrypting → Materialized`,
//! with `Failed` reachable from Fetching and Decrypting.
//!
//! The already-present short-circuit delegates to the swarm engine as the
//! single source of truth for active transfers, which is what makes
//! duplicate triggers (a user download racing a backup notification for
//! the same identifier) collapse into one swarm join. Two concurrent
//! fetches can both pass the presence check; the engine rejects the second
//! join, and that rejection resolves as `AlreadyPresent` rather than an
//! error.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::security::{decrypt_file, digest_file};
use crate::swarm::TransferEvent;

use super::core::Distributor;
use super::error::DistributorError;
use super::events::{DistributorEvent, DownloadFinishedEvent};
use super::types::{FetchKind, FetchOutcome, FetchStatus, SwarmId};

impl Distributor {
    /// Fetch content for a swarm identifier.
    ///
    /// `UserInitiated` fetches decrypt into the downloads directory and
    /// notify observers; `BackupSync` fetches only retain the encrypted
    /// artifact for re-seeding and stay silent. Either way the swarm copy
    /// lands in the share root staging area, never directly in a
    /// user-visible destination.
    pub async fn fetch(
        &self,
        identifier: &SwarmId,
        kind: FetchKind,
    ) -> Result<FetchOutcome, DistributorError> {
        self.ensure_running().await?;

        // Idempotence: duplicate triggers short-circuit without re-joining
        if self.engine.get(identifier).await.is_some() {
            debug!(identifier = %identifier, "transfer already present");
            self.emit_fetch_status(identifier, FetchStatus::AlreadyPresent)
                .await;
            return Ok(FetchOutcome::AlreadyPresent);
        }

        debug!(identifier = %identifier, kind = ?kind, "joining swarm");
        let mut transfer = match self
            .engine
            .add(identifier, self.config.share_root.clone())
            .await
        {
            Ok(transfer) => transfer,
            Err(e) => {
                // Another fetch for the same identifier joined between the
                // presence check and this call; the engine's rejection is
                // authoritative, so resolve it as already present.
                if self.engine.get(identifier).await.is_some() {
                    debug!(identifier = %identifier, "lost join race, transfer already present");
                    self.emit_fetch_status(identifier, FetchStatus::AlreadyPresent)
                        .await;
                    return Ok(FetchOutcome::AlreadyPresent);
                }
                return Err(self.fail_fetch(identifier, kind, e).await);
            }
        };
        self.emit_fetch_status(identifier, FetchStatus::Fetching)
            .await;

        // Consume lifecycle events until the transfer completes
        loop {
            match transfer.events.recv().await {
                Some(TransferEvent::Ready) => {
                    debug!(identifier = %identifier, "transfer ready");
                }
                Some(TransferEvent::NoPeers(announce)) => {
                    debug!(identifier = %identifier, announce = %announce, "no peers found");
                }
                Some(TransferEvent::Done) => break,
                Some(TransferEvent::Error(e)) => {
                    self.cleanup_failed_fetch(identifier, &transfer.content_path)
                        .await;
                    return Err(self
                        .fail_fetch(identifier, kind, DistributorError::SwarmEngine(e))
                        .await);
                }
                None => {
                    self.cleanup_failed_fetch(identifier, &transfer.content_path)
                        .await;
                    return Err(self
                        .fail_fetch(
                            identifier,
                            kind,
                            DistributorError::SwarmEngine("transfer event stream closed".to_string()),
                        )
                        .await);
                }
            }
        }

        let name = transfer.display_name.clone();
        let staged = transfer.content_path.clone();
        info!(identifier = %identifier, name = %name, "transfer complete");

        let outcome_path = if kind == FetchKind::UserInitiated {
            self.emit_fetch_status(identifier, FetchStatus::Decrypting)
                .await;

            // Decrypting: key is looked up by the digest of the encrypted
            // artifact (that is what the key service indexes)
            let digest = {
                let staged_for_digest = staged.clone();
                match tokio::task::spawn_blocking(move || digest_file(&staged_for_digest))
                    .await
                    .map_err(|e| DistributorError::Io(e.to_string()))?
                {
                    Ok(digest) => digest,
                    Err(e) => {
                        self.cleanup_failed_fetch(identifier, &staged).await;
                        return Err(self.fail_fetch(identifier, kind, e).await);
                    }
                }
            };

            let key = match self.keys.resolve_for_fetch(&digest).await {
                Ok(key) => key,
                Err(e) => {
                    self.cleanup_failed_fetch(identifier, &staged).await;
                    return Err(self.fail_fetch(identifier, kind, e).await);
                }
            };

            let destination = self.config.downloads_dir.join(&name);
            let result = {
                let staged = staged.clone();
                let destination = destination.clone();
                tokio::task::spawn_blocking(move || decrypt_file(&staged, &destination, &key))
                    .await
                    .map_err(|e| DistributorError::Io(e.to_string()))?
            };
            if let Err(e) = result {
                self.cleanup_failed_fetch(identifier, &staged).await;
                return Err(self.fail_fetch(identifier, kind, e).await);
            }

            info!(destination = %destination.display(), "download materialized");
            self.emit(DistributorEvent::DownloadFinished(DownloadFinishedEvent {
                name: name.clone(),
                path: destination.clone(),
            }))
            .await;
            destination
        } else {
            // Backup sync keeps the encrypted copy alive for re-seeding;
            // no decryption, no user notification
            debug!(identifier = %identifier, "backup fetch retained encrypted artifact");
            staged
        };
        self.emit_fetch_status(identifier, FetchStatus::Materialized)
            .await;

        // Tell the membership service this peer now also holds the artifact
        let membership = self.membership.clone();
        let magnet = identifier.clone();
        tokio::spawn(async move {
            membership.announce_join(&magnet).await;
        });

        Ok(FetchOutcome::Materialized {
            name,
            path: outcome_path,
        })
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Withdraw the failed transfer and remove its staging artifact
    async fn cleanup_failed_fetch(&self, identifier: &SwarmId, staged: &Path) {
        if let Err(e) = self.engine.remove(identifier).await {
            warn!(identifier = %identifier, error = %e, "failed to withdraw failed transfer");
        }
        if staged.is_file() {
            if let Err(e) = tokio::fs::remove_file(staged).await {
                warn!(path = %staged.display(), error = %e, "failed to remove staging artifact");
            }
        }
    }

    /// Mark a fetch failed; backup-sync failures stay out of the UI
    async fn fail_fetch(
        &self,
        identifier: &SwarmId,
        kind: FetchKind,
        error: DistributorError,
    ) -> DistributorError {
        match kind {
            FetchKind::UserInitiated => {
                warn!(identifier = %identifier, error = %error, "fetch failed");
            }
            FetchKind::BackupSync => {
                debug!(identifier = %identifier, error = %error, "backup fetch failed");
            }
        }
        self.emit_fetch_status(identifier, FetchStatus::Failed)
            .await;
        error
    }
}
