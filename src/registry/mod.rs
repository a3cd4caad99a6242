//! Share registry
//!
//! In-memory, process-lifetime map from published artifact path to swarm
//! identifier. This is the single source of truth for "is this path
//! currently offered to the swarm".
//!
//! Single-writer precondition: all mutations must happen on the distributor's
//! logical thread of control (the publish/unshare paths). The registry holds
//! no internal lock; the distributor wraps it in one and the periodic
//! broadcast only ever reads a snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::distributor::types::SwarmId;

/// Map from published path to swarm identifier
#[derive(Debug, Default)]
pub struct ShareRegistry {
    entries: HashMap<PathBuf, SwarmId>,
}

impl ShareRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mapping for `path`.
    ///
    /// If a prior identifier existed the caller must already have withdrawn
    /// it from the swarm engine; the registry never talks to the engine.
    /// Returns the replaced identifier, if any.
    pub fn record(&mut self, path: PathBuf, identifier: SwarmId) -> Option<SwarmId> {
        self.entries.insert(path, identifier)
    }

    /// Look up the identifier for a path
    pub fn lookup(&self, path: &Path) -> Option<&SwarmId> {
        self.entries.get(path)
    }

    /// Remove the mapping for a path, returning the identifier if present
    pub fn remove(&mut self, path: &Path) -> Option<SwarmId> {
        self.entries.remove(path)
    }

    /// Snapshot of all (path, identifier) pairs for observer broadcast
    pub fn all(&self) -> Vec<(PathBuf, SwarmId)> {
        self.entries
            .iter()
            .map(|(p, id)| (p.clone(), id.clone()))
            .collect()
    }

    /// Number of currently offered paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no paths are currently offered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
