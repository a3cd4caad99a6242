//! Membership service calls
//!
//! Notifies the external coordination service about what this peer holds
//! (shared-join / shared-leave), registers group access for published
//! digests, and runs the pre-publish safety scan.
//!
//! All announce calls are best-effort side effects of the pipeline: a
//! failure is logged and never propagates into the publish or fetch state
//! machines.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use super::session::Session;

/// Client for the membership/coordination endpoints
pub struct MembershipService {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl MembershipService {
    /// Create a membership client sharing the distributor's session
    pub fn new(http: reqwest::Client, base_url: String, session: Arc<Session>) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    /// Announce a newly seeded artifact so other members can back it up.
    /// Best-effort; failures are logged only.
    pub async fn announce_seed(&self, digest: &str, filename: &str, magnet: &str) {
        let payload = json!({
            "hash": digest,
            "filename": filename,
            "magnetLink": magnet,
        });
        self.post_shared_join(payload).await;
    }

    /// Announce that this peer now also holds a fetched artifact.
    /// Best-effort; failures are logged only.
    pub async fn announce_join(&self, magnet: &str) {
        let payload = json!({ "magnetLink": magnet });
        self.post_shared_join(payload).await;
    }

    async fn post_shared_join(&self, payload: serde_json::Value) {
        let Some(token) = self.session.ensure_valid_token().await else {
            warn!("no access token, skipping shared-join");
            return;
        };

        let result = self
            .http
            .post(format!("{}/api/shared-join/", self.base_url))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("posted shared files info");
            }
            Ok(response) => {
                warn!(status = %response.status(), "shared-join rejected");
            }
            Err(e) => {
                warn!(error = %e, "shared-join unreachable");
            }
        }
    }

    /// Tell the service this peer is leaving the network (process shutdown).
    /// Best-effort; failures are logged only.
    pub async fn leave(&self) {
        let Some(token) = self.session.ensure_valid_token().await else {
            warn!("no access token, skipping shared-leave");
            return;
        };

        let result = self
            .http
            .get(format!("{}/api/shared-leave/", self.base_url))
            .bearer_auth(token)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!("left shared network");
            }
            Ok(response) => {
                warn!(status = %response.status(), "shared-leave rejected");
            }
            Err(e) => {
                warn!(error = %e, "shared-leave unreachable");
            }
        }
    }

    /// Register group access for a published content digest.
    /// Best-effort; failures are logged only.
    pub async fn register_access(&self, group_id: &str, digest: &str) {
        let result = self
            .http
            .post(format!("{}/api/access/", self.base_url))
            .json(&json!({ "group": group_id, "file_hash": digest }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(group = group_id, "registered group access");
            }
            Ok(response) => {
                warn!(status = %response.status(), group = group_id, "access registration rejected");
            }
            Err(e) => {
                warn!(error = %e, group = group_id, "access registration unreachable");
            }
        }
    }

    /// Run the external safety scan on a source path.
    ///
    /// Returns the service verdict. An unreachable or unauthenticated scan
    /// service passes with a warning; only an explicit negative verdict
    /// rejects the file.
    pub async fn scan_file(&self, path: &Path) -> bool {
        let Some(token) = self.session.ensure_valid_token().await else {
            warn!(path = %path.display(), "no access token, skipping safety scan");
            return true;
        };

        let result = self
            .http
            .post(format!("{}/api/virus-scan/", self.base_url))
            .bearer_auth(token)
            .json(&json!({ "file_path": path.to_string_lossy() }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<serde_json::Value>().await {
                    Ok(body) => {
                        let safe = body
                            .get("is_safe")
                            .and_then(|v| v.as_bool())
                            .unwrap_or(true);
                        if !safe {
                            warn!(path = %path.display(), "safety scan rejected file");
                        }
                        safe
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed scan response, passing");
                        true
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "scan service rejected request, passing");
                true
            }
            Err(e) => {
                warn!(error = %e, "scan service unreachable, passing");
                true
            }
        }
    }
}
