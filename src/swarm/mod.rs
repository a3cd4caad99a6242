//! Swarm engine collaborator interface
//!
//! The piece-exchange transport (peer discovery, tracker announce, piece
//! exchange) lives outside this crate. The distributor drives it through
//! this trait and consumes its lifecycle events as an async stream, one
//! event per state transition.
//!
//! The engine is also the single source of truth for "is this identifier
//! already active": `add()` must reject a second join for an identifier
//! that is already active, and the distributor resolves such rejections
//! as already-present, so two fetches never join the same swarm twice
//! even when both pass the `get()` presence check.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::distributor::error::DistributorError;
use crate::distributor::types::SwarmId;

/// Lifecycle events for one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Metadata resolved, store ready
    Ready,
    /// All content downloaded (never emitted for pure seeds)
    Done,
    /// Fatal transfer error
    Error(String),
    /// An announce completed but found no peers
    NoPeers(String),
}

/// Handle for an active transfer, with its event stream
#[derive(Debug)]
pub struct Transfer {
    /// Identifier assigned by the engine (magnet-style URI)
    pub identifier: SwarmId,
    /// Display name of the content set
    pub display_name: String,
    /// Local path of the content (seed source, or download destination)
    pub content_path: PathBuf,
    /// Lifecycle event stream for this transfer
    pub events: mpsc::Receiver<TransferEvent>,
}

/// Read-only view of an active transfer (events stay with the owner)
#[derive(Debug, Clone)]
pub struct TransferInfo {
    /// Identifier assigned by the engine
    pub identifier: SwarmId,
    /// Display name of the content set
    pub display_name: String,
    /// Local path of the content
    pub content_path: PathBuf,
}

/// The external swarm engine
#[async_trait]
pub trait SwarmEngine: Send + Sync {
    /// Begin seeding local content, announcing to `trackers`.
    /// Returns a handle carrying the engine-assigned identifier.
    async fn seed(&self, path: PathBuf, trackers: &[String]) -> Result<Transfer, DistributorError>;

    /// Join the swarm for `identifier`, writing into `dest_dir`.
    async fn add(&self, identifier: &SwarmId, dest_dir: PathBuf)
        -> Result<Transfer, DistributorError>;

    /// Look up an active (or completed, still-held) transfer.
    async fn get(&self, identifier: &SwarmId) -> Option<TransferInfo>;

    /// Withdraw a transfer from the swarm.
    async fn remove(&self, identifier: &SwarmId) -> Result<(), DistributorError>;
}
