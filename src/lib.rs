//! PeerLink Core
//!
//! Secure content distribution over peer-to-peer swarms.
//!
//! This crate orchestrates the pipeline that turns a local file into an
//! encrypted, seeded swarm artifact and back:
//! - Publish: safety scan, gzip + AES-CBC transform, seed, index, announce
//! - Fetch: join, download, key lookup by artifact digest, decrypt, notify
//! - Registry: single-writer map from published path to swarm identifier
//! - Background sync: membership push subscription and registry broadcasts
//!
//! The swarm transport itself (peer discovery, tracker announce, piece
//! exchange) is external and reached through the [`swarm::SwarmEngine`]
//! trait.
//!
//! # Module Structure
//!
//! - `distributor/`: Public interface (Distributor, config, events, the
//!   publish and fetch state machines)
//! - `tasks/`: Background automation (membership sync, registry broadcast)
//! - `registry/`: The share registry
//! - `security/`: Cryptography (digests, group keys, the content transform)
//! - `services/`: Coordination-server HTTP clients (session, membership,
//!   metadata indexing)
//! - `swarm/`: The swarm engine collaborator trait
//! - `testing/`: Test utilities
//!
//! # Quick Start
//!
//! ```ignore
//! use peerlink_core::{Distributor, DistributorConfig, FetchKind};
//!
//! // Start the distributor against a swarm engine
//! let config = DistributorConfig::default();
//! let distributor = Arc::new(Distributor::start(config, engine)?);
//! distributor.start_background_tasks().await;
//!
//! // Publish a file to a group
//! distributor.publish(&path, "team-alpha").await?;
//!
//! // Fetch by swarm identifier
//! distributor.fetch(&identifier, FetchKind::UserInitiated).await?;
//!
//! // Observe pipeline events
//! let mut events = distributor.events().await.unwrap();
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

// Public interface
pub mod distributor;

// Internal modules
pub(crate) mod tasks;

// Infrastructure modules (pub for flexibility)
pub mod registry;
pub mod security;
pub mod services;
pub mod swarm;
pub mod testing;

// Re-export main API types for convenience
pub use distributor::{
    Digest,
    Distributor,
    DistributorConfig,
    DistributorError,
    DistributorEvent,
    DownloadFinishedEvent,
    FetchKind,
    FetchOutcome,
    FetchStatus,
    PendingScanRecord,
    PublishFailedEvent,
    ShareEntry,
    ShareStatus,
    SwarmId,
};
