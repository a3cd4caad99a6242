//! Distributor events for the application layer
//!
//! Emitted over an mpsc channel so a UI/IPC layer can mirror pipeline
//! progress without polling.

use std::path::PathBuf;

use super::types::{FetchStatus, PendingScanRecord, ShareStatus, SwarmId};

/// Events emitted by the distributor for observers
#[derive(Debug, Clone)]
pub enum DistributorEvent {
    /// The share registry changed (publish, unshare) or the periodic
    /// broadcast tick fired. Carries a full snapshot.
    RegistryUpdated(Vec<(PathBuf, SwarmId)>),
    /// A user-initiated download finished and was decrypted into place.
    /// Never emitted for backup-sync fetches.
    DownloadFinished(DownloadFinishedEvent),
    /// A file entered the pipeline and is awaiting its safety scan verdict
    ScanStarted(PendingScanRecord),
    /// The safety scan resolved; the pending record is gone
    ScanResolved {
        /// Record id that resolved
        id: u64,
        /// Whether the file was accepted
        accepted: bool,
    },
    /// A publish operation failed after being requested
    PublishFailed(PublishFailedEvent),
    /// A publish or withdraw operation moved to a new state
    ShareStatusChanged {
        /// Source path the operation was requested for
        path: PathBuf,
        /// New state
        status: ShareStatus,
    },
    /// A fetch operation moved to a new state
    FetchStatusChanged {
        /// Swarm identifier being fetched
        identifier: SwarmId,
        /// New state
        status: FetchStatus,
    },
}

/// Event: a user-initiated download was materialized
#[derive(Debug, Clone)]
pub struct DownloadFinishedEvent {
    /// Display name of the fetched content
    pub name: String,
    /// Decrypted destination path
    pub path: PathBuf,
}

/// Event: a publish operation failed
#[derive(Debug, Clone)]
pub struct PublishFailedEvent {
    /// Source path that failed to publish
    pub source_path: PathBuf,
    /// Human-readable reason
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_updated_snapshot() {
        let event = DistributorEvent::RegistryUpdated(vec![(
            PathBuf::from("/shared/a.bin"),
            "magnet:?xt=urn:btih:aaa".to_string(),
        )]);
        match event {
            DistributorEvent::RegistryUpdated(snapshot) => {
                assert_eq!(snapshot.len(), 1);
                assert_eq!(snapshot[0].0, PathBuf::from("/shared/a.bin"));
            }
            _ => panic!("expected RegistryUpdated"),
        }
    }

    #[test]
    fn test_download_finished_event() {
        let event = DownloadFinishedEvent {
            name: "report.pdf".to_string(),
            path: PathBuf::from("/downloads/report.pdf"),
        };
        assert_eq!(event.name, "report.pdf");
    }

    #[test]
    fn test_status_change_events() {
        let event = DistributorEvent::ShareStatusChanged {
            path: PathBuf::from("/tmp/a"),
            status: ShareStatus::Encrypting,
        };
        match event {
            DistributorEvent::ShareStatusChanged { status, .. } => {
                assert_eq!(status, ShareStatus::Encrypting);
            }
            _ => panic!("expected ShareStatusChanged"),
        }

        let event = DistributorEvent::FetchStatusChanged {
            identifier: "magnet:x".to_string(),
            status: FetchStatus::Decrypting,
        };
        match event {
            DistributorEvent::FetchStatusChanged { status, .. } => {
                assert_eq!(status, FetchStatus::Decrypting);
            }
            _ => panic!("expected FetchStatusChanged"),
        }
    }

    #[test]
    fn test_publish_failed_event() {
        let event = PublishFailedEvent {
            source_path: PathBuf::from("/tmp/x"),
            reason: "group key unavailable: 500".to_string(),
        };
        assert!(event.reason.contains("unavailable"));
    }
}
