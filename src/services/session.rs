//! Bearer-token session layer
//!
//! Holds the access/refresh token pair issued by the external credential
//! service and keeps the access token usable: before each authenticated
//! call the pipeline asks for a valid token, which probes the service and
//! transparently refreshes on a 401.
//!
//! Token absence is soft here (callers decide whether a missing token is
//! fatal); best-effort side effects log and skip, nothing retries.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Session token store with transparent refresh
pub struct Session {
    http: reqwest::Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
    refresh_token: RwLock<Option<String>>,
}

impl Session {
    /// Create an empty session for the given coordination server
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url,
            access_token: RwLock::new(None),
            refresh_token: RwLock::new(None),
        }
    }

    /// Install or clear the access token
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    /// Install or clear the refresh token
    pub async fn set_refresh_token(&self, token: Option<String>) {
        *self.refresh_token.write().await = token;
    }

    /// Return a currently valid access token, refreshing if needed.
    ///
    /// `None` means there is no usable session; callers treat that as
    /// "skip" for best-effort side effects.
    pub async fn ensure_valid_token(&self) -> Option<String> {
        let token = self.access_token.read().await.clone()?;

        let probe = self
            .http
            .get(format!("{}/api/users/me/", self.base_url))
            .bearer_auth(&token)
            .send()
            .await;

        match probe {
            Ok(response) if response.status().is_success() => Some(token),
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                debug!("access token rejected, attempting refresh");
                self.refresh_access_token().await
            }
            Ok(response) => {
                warn!(status = %response.status(), "session probe failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "session probe unreachable");
                None
            }
        }
    }

    async fn refresh_access_token(&self) -> Option<String> {
        let refresh = self.refresh_token.read().await.clone()?;

        let response = self
            .http
            .post(format!("{}/api/auth/token/refresh/", self.base_url))
            .json(&json!({ "refresh": refresh }))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<RefreshResponse>().await {
                    Ok(body) => {
                        *self.access_token.write().await = Some(body.access.clone());
                        debug!("access token refreshed");
                        Some(body.access)
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed refresh response");
                        None
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "token refresh rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "token refresh unreachable");
                None
            }
        }
    }
}
