//! Testing utilities for the distributor
//!
//! Provides an in-process mock swarm engine for testing the pipeline
//! without a real peer-to-peer transport.
//!
//! # Example
//!
//! ```ignore
//! let engine = Arc::new(MockSwarmEngine::new());
//!
//! // Script an inbound transfer
//! engine.expect_content("magnet:?xt=urn:btih:abc", "report.pdf.enc", &bytes);
//!
//! // Fetch through the distributor
//! let outcome = distributor.fetch(&identifier, FetchKind::UserInitiated).await?;
//! ```

pub mod swarm;

pub use swarm::MockSwarmEngine;
