//! The distributor: publish and fetch pipelines, registry broadcasting,
//! pending-scan bookkeeping and lifecycle management.

pub mod config;
pub mod core;
pub mod error;
pub mod events;
mod fetch;
mod publish;
pub mod types;

pub use config::DistributorConfig;
pub use self::core::Distributor;
pub use error::DistributorError;
pub use events::{DistributorEvent, DownloadFinishedEvent, PublishFailedEvent};
pub use types::{
    Digest, FetchKind, FetchOutcome, FetchStatus, PendingScanRecord, ShareEntry, ShareStatus,
    SwarmId,
};
