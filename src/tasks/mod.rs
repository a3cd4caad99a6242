//! Background tasks for the Distributor
//!
//! This module contains the long-running background tasks:
//! - Membership sync (websocket push subscription, triggers backup fetches)
//! - Registry broadcast (periodic registry snapshots for observers)

mod membership_sync;
mod registry_broadcast;

use std::sync::Arc;

use crate::distributor::Distributor;

impl Distributor {
    /// Start background tasks (membership sync, registry broadcast)
    pub async fn start_background_tasks(self: &Arc<Self>) {
        let mut tasks = self.tasks.write().await;

        // 1. Membership sync (subscribes to server push, fetches on notification)
        let this = self.clone();
        let sync_task = tokio::spawn(async move {
            Self::run_membership_sync(this).await;
        });
        tasks.push(sync_task);

        // 2. Registry broadcast (periodic snapshots so observers can lag safely)
        let this = self.clone();
        let broadcast_task = tokio::spawn(async move {
            Self::run_registry_broadcast(this).await;
        });
        tasks.push(broadcast_task);
    }
}
