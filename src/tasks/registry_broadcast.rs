//! Registry broadcast task
//!
//! Periodically emits a full registry snapshot to the observer channel.
//! Snapshots are self-contained, so an observer that missed incremental
//! updates (slow UI, reconnecting frontend) converges on the next tick.

use std::sync::Arc;

use tracing::{info, trace};

use crate::distributor::Distributor;

impl Distributor {
    /// Run the registry broadcast loop
    pub(crate) async fn run_registry_broadcast(this: Arc<Distributor>) {
        info!(
            interval_ms = this.config.broadcast_interval.as_millis() as u64,
            "registry broadcast started"
        );

        loop {
            if !*this.running.read().await {
                break;
            }

            tokio::time::sleep(this.config.broadcast_interval).await;

            trace!("registry broadcast tick");
            this.broadcast_registry().await;
        }

        info!("registry broadcast stopped");
    }
}
