//! Distributor configuration

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the content distributor
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// Managed share root directory. Encrypted artifacts are written here and
    /// only the distributor writes to it.
    pub share_root: PathBuf,

    /// Destination directory for decrypted user downloads
    pub downloads_dir: PathBuf,

    /// Tracker announce URLs passed to the swarm engine when seeding
    pub trackers: Vec<String>,

    /// Base URL of the coordination service (key, membership, index APIs)
    pub server_url: String,

    /// WebSocket URL of the push channel for membership events
    pub ws_url: String,

    /// Command invoked for metadata extraction on published files
    /// Default: "extract"
    pub extract_command: String,

    /// Interval between registry snapshot broadcasts
    /// Default: 3 seconds
    pub broadcast_interval: Duration,

    /// Delay before retrying a dropped push-channel subscription
    /// Default: 5 seconds
    pub resubscribe_delay: Duration,

    /// Capacity of the observer event channel
    /// Default: 256
    pub event_channel_capacity: usize,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            share_root: home.join("shared"),
            downloads_dir: home.join("Downloads"),
            trackers: vec![],
            server_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000/ws".to_string(),
            extract_command: "extract".to_string(),
            broadcast_interval: Duration::from_secs(3),
            resubscribe_delay: Duration::from_secs(5),
            event_channel_capacity: 256,
        }
    }
}

impl DistributorConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the managed share root directory
    pub fn with_share_root(mut self, path: PathBuf) -> Self {
        self.share_root = path;
        self
    }

    /// Set the downloads destination directory
    pub fn with_downloads_dir(mut self, path: PathBuf) -> Self {
        self.downloads_dir = path;
        self
    }

    /// Set tracker announce URLs (replaces existing)
    pub fn with_trackers(mut self, trackers: Vec<String>) -> Self {
        self.trackers = trackers;
        self
    }

    /// Set the coordination service base URL
    pub fn with_server_url(mut self, url: String) -> Self {
        self.server_url = url;
        self
    }

    /// Set the push channel WebSocket URL
    pub fn with_ws_url(mut self, url: String) -> Self {
        self.ws_url = url;
        self
    }

    /// Set the metadata extraction command
    pub fn with_extract_command(mut self, command: String) -> Self {
        self.extract_command = command;
        self
    }

    /// Set the registry broadcast interval
    pub fn with_broadcast_interval(mut self, interval: Duration) -> Self {
        self.broadcast_interval = interval;
        self
    }

    /// Configuration for testing (temp-style paths, fast ticks)
    pub fn for_testing(root: PathBuf) -> Self {
        Self {
            share_root: root.join("shared"),
            downloads_dir: root.join("downloads"),
            trackers: vec![],
            server_url: "http://127.0.0.1:0".to_string(),
            ws_url: "ws://127.0.0.1:0/ws".to_string(),
            extract_command: "true".to_string(),
            broadcast_interval: Duration::from_millis(50),
            resubscribe_delay: Duration::from_millis(50),
            event_channel_capacity: 64,
        }
    }
}
