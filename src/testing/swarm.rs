//! Mock swarm engine
//!
//! In-process [`SwarmEngine`] that scripts transfers instead of talking
//! to a real swarm. Seeds are assigned deterministic identifiers;
//! inbound transfers are scripted ahead of time with `expect_content`
//! (the bytes land in the destination directory when `add` is called)
//! or `expect_failure`. All calls are recorded for assertions.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::distributor::error::DistributorError;
use crate::distributor::types::SwarmId;
use crate::swarm::{SwarmEngine, Transfer, TransferEvent, TransferInfo};

enum Script {
    /// Deliver these bytes under this display name, then complete
    Content { name: String, bytes: Vec<u8> },
    /// Emit a fatal transfer error
    Failure(String),
}

#[derive(Default)]
struct Inner {
    active: HashMap<SwarmId, TransferInfo>,
    scripts: HashMap<SwarmId, Script>,
    seeds: Vec<PathBuf>,
    joins: Vec<SwarmId>,
    removals: Vec<SwarmId>,
    seed_seq: u64,
}

/// Scripted in-process swarm engine
#[derive(Default)]
pub struct MockSwarmEngine {
    inner: Mutex<Inner>,
}

impl MockSwarmEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an inbound transfer: `add(identifier)` will write `bytes`
    /// into the destination directory under `name` and complete.
    pub async fn expect_content(&self, identifier: &str, name: &str, bytes: &[u8]) {
        self.inner.lock().await.scripts.insert(
            identifier.to_string(),
            Script::Content {
                name: name.to_string(),
                bytes: bytes.to_vec(),
            },
        );
    }

    /// Script an inbound transfer that fails with `message`
    pub async fn expect_failure(&self, identifier: &str, message: &str) {
        self.inner
            .lock()
            .await
            .scripts
            .insert(identifier.to_string(), Script::Failure(message.to_string()));
    }

    /// Paths that have been offered for seeding, in call order
    pub async fn seeded_paths(&self) -> Vec<PathBuf> {
        self.inner.lock().await.seeds.clone()
    }

    /// Identifiers that have been joined, in call order
    pub async fn joined(&self) -> Vec<SwarmId> {
        self.inner.lock().await.joins.clone()
    }

    /// Identifiers that have been withdrawn, in call order
    pub async fn removed(&self) -> Vec<SwarmId> {
        self.inner.lock().await.removals.clone()
    }

    /// Currently active identifiers
    pub async fn active(&self) -> Vec<SwarmId> {
        self.inner.lock().await.active.keys().cloned().collect()
    }
}

#[async_trait]
impl SwarmEngine for MockSwarmEngine {
    async fn seed(&self, path: PathBuf, _trackers: &[String]) -> Result<Transfer, DistributorError> {
        let mut inner = self.inner.lock().await;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        inner.seed_seq += 1;
        let identifier = format!("magnet:?xt=urn:mock:{}&dn={}", inner.seed_seq, name);

        inner.seeds.push(path.clone());
        inner.active.insert(
            identifier.clone(),
            TransferInfo {
                identifier: identifier.clone(),
                display_name: name.clone(),
                content_path: path.clone(),
            },
        );

        let (tx, rx) = mpsc::channel(8);
        let _ = tx.send(TransferEvent::Ready).await;

        Ok(Transfer {
            identifier,
            display_name: name,
            content_path: path,
            events: rx,
        })
    }

    async fn add(
        &self,
        identifier: &SwarmId,
        dest_dir: PathBuf,
    ) -> Result<Transfer, DistributorError> {
        let mut inner = self.inner.lock().await;

        if inner.active.contains_key(identifier) {
            return Err(DistributorError::SwarmEngine(format!(
                "already active: {identifier}"
            )));
        }
        inner.joins.push(identifier.clone());

        let (tx, rx) = mpsc::channel(8);
        let (name, content_path) = match inner.scripts.get(identifier) {
            Some(Script::Content { name, bytes }) => {
                let content_path = dest_dir.join(name);
                std::fs::write(&content_path, bytes)
                    .map_err(|e| DistributorError::SwarmEngine(e.to_string()))?;
                let _ = tx.send(TransferEvent::Ready).await;
                let _ = tx.send(TransferEvent::Done).await;
                (name.clone(), content_path)
            }
            Some(Script::Failure(message)) => {
                let _ = tx.send(TransferEvent::Error(message.clone())).await;
                (identifier.clone(), dest_dir.join(identifier))
            }
            None => {
                let _ = tx
                    .send(TransferEvent::Error(format!("unknown identifier: {identifier}")))
                    .await;
                (identifier.clone(), dest_dir.join(identifier))
            }
        };

        inner.active.insert(
            identifier.clone(),
            TransferInfo {
                identifier: identifier.clone(),
                display_name: name.clone(),
                content_path: content_path.clone(),
            },
        );

        Ok(Transfer {
            identifier: identifier.clone(),
            display_name: name,
            content_path,
            events: rx,
        })
    }

    async fn get(&self, identifier: &SwarmId) -> Option<TransferInfo> {
        let info = self.inner.lock().await.active.get(identifier).cloned();
        // Resolve the lookup before yielding: overlapping callers can
        // interleave here the way they would against a real remote engine
        tokio::task::yield_now().await;
        info
    }

    async fn remove(&self, identifier: &SwarmId) -> Result<(), DistributorError> {
        let mut inner = self.inner.lock().await;
        inner.active.remove(identifier);
        inner.removals.push(identifier.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_seed_assigns_unique_identifiers() {
        let engine = MockSwarmEngine::new();
        let a = engine
            .seed(PathBuf::from("/tmp/a.enc"), &[])
            .await
            .unwrap();
        let b = engine
            .seed(PathBuf::from("/tmp/b.enc"), &[])
            .await
            .unwrap();
        assert_ne!(a.identifier, b.identifier);
        assert!(engine.get(&a.identifier).await.is_some());
        assert_eq!(engine.seeded_paths().await.len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_add_delivers_content() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockSwarmEngine::new();
        engine
            .expect_content("magnet:?xt=urn:mock:x", "doc.enc", b"ciphertext")
            .await;

        let mut transfer = engine
            .add(&"magnet:?xt=urn:mock:x".to_string(), dir.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(transfer.events.recv().await, Some(TransferEvent::Ready));
        assert_eq!(transfer.events.recv().await, Some(TransferEvent::Done));
        assert_eq!(std::fs::read(&transfer.content_path).unwrap(), b"ciphertext");
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockSwarmEngine::new());
        engine.expect_content("m1", "f.enc", b"x").await;

        engine
            .add(&"m1".to_string(), dir.path().to_path_buf())
            .await
            .unwrap();
        let err = engine
            .add(&"m1".to_string(), dir.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(matches!(err, DistributorError::SwarmEngine(_)));
    }

    #[tokio::test]
    async fn test_remove_clears_active() {
        let engine = MockSwarmEngine::new();
        let transfer = engine
            .seed(PathBuf::from("/tmp/a.enc"), &[])
            .await
            .unwrap();
        engine.remove(&transfer.identifier).await.unwrap();
        assert!(engine.get(&transfer.identifier).await.is_none());
        assert_eq!(engine.removed().await, vec![transfer.identifier]);
    }
}
