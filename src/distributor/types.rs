//! Core types for the distribution pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Opaque swarm identifier (magnet-style URI) returned by the swarm engine
pub type SwarmId = String;

/// Lowercase hex SHA-256 content digest
pub type Digest = String;

/// State of a publish operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareStatus {
    /// Verifying the source path
    Scanning,
    /// Running the compress+encrypt transform
    Encrypting,
    /// Handing the artifact to the swarm engine
    Publishing,
    /// Actively seeded, registry entry recorded
    Published,
    /// Being withdrawn from the swarm
    Removing,
    /// Terminal failure; no registry entry recorded
    Failed,
}

/// One locally shared file
///
/// At most one entry exists per `published_path` at any time. Re-publishing
/// the same path tears down the prior entry before a new one is recorded.
#[derive(Debug, Clone)]
pub struct ShareEntry {
    /// Original absolute path supplied by the caller (read-only to us)
    pub source_path: PathBuf,
    /// Path of the encrypted artifact inside the share root (owned by us)
    pub published_path: PathBuf,
    /// SHA-256 of the artifact bytes at publish time
    pub content_digest: Digest,
    /// Handle returned by the swarm engine; present only while offered
    pub swarm_identifier: Option<SwarmId>,
    /// Whether the source is a directory
    pub is_directory: bool,
    /// Current state
    pub status: ShareStatus,
}

/// How a fetch was triggered; governs decryption and user notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Explicit user download: decrypt to the downloads directory and notify
    UserInitiated,
    /// Triggered by a membership backup event: keep the encrypted copy alive
    /// for re-seeding, no decryption, no user notification
    BackupSync,
}

/// State of a fetch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// The identifier already had an active transfer; nothing to do
    AlreadyPresent,
    /// Joined the swarm, pieces in flight
    Fetching,
    /// Transfer complete, running the decrypt+decompress transform
    Decrypting,
    /// Plaintext materialized (or encrypted copy retained, for backup sync)
    Materialized,
    /// Terminal failure; staging artifact cleaned up
    Failed,
}

/// Terminal outcome of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A transfer for this identifier was already active or complete
    AlreadyPresent,
    /// The transfer completed and the artifact was materialized
    Materialized {
        /// Display name reported by the swarm engine
        name: String,
        /// Final destination (downloads dir for user fetches, share root
        /// staging artifact for backup sync)
        path: PathBuf,
    },
}

/// UI-visible progress record for a file awaiting its safety scan verdict
///
/// Created when a file enters the pipeline, destroyed the instant the
/// external scan resolves. Not authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingScanRecord {
    /// Monotonic record id
    pub id: u64,
    /// Display name of the file
    pub file_name: String,
    /// Source path being scanned
    pub file_path: PathBuf,
    /// Free-form status label for the UI
    pub status: String,
}
