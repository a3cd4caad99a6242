//! Membership sync task
//!
//! Subscribes to the coordination server's websocket push channel and
//! turns each push notification into a silent backup fetch. The
//! subscription is authenticated with the current access token and
//! re-established with a fixed delay whenever it drops, so a flaky
//! server costs availability of new notifications but never crashes
//! the distributor.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::distributor::types::{FetchKind, SwarmId};
use crate::distributor::Distributor;

impl Distributor {
    /// Run the membership sync loop (websocket subscribe + backup fetch)
    pub(crate) async fn run_membership_sync(this: Arc<Distributor>) {
        info!(ws_url = %this.config.ws_url, "membership sync started");

        loop {
            if !*this.running.read().await {
                break;
            }

            let Some(token) = this.session.ensure_valid_token().await else {
                debug!("membership sync: no session token, waiting");
                tokio::time::sleep(this.config.resubscribe_delay).await;
                continue;
            };

            let url = format!("{}/?token={}", this.config.ws_url, token);
            let mut stream = match connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    info!("membership sync: subscribed");
                    stream
                }
                Err(e) => {
                    warn!(error = %e, "membership sync: subscribe failed");
                    tokio::time::sleep(this.config.resubscribe_delay).await;
                    continue;
                }
            };

            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let Some(identifier) = parse_push_message(&text) else {
                            debug!(message = %text, "membership sync: unrecognized push");
                            continue;
                        };
                        Self::trigger_backup_fetch(&this, identifier);
                    }
                    Ok(Message::Close(_)) => {
                        debug!("membership sync: server closed subscription");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "membership sync: subscription error");
                        break;
                    }
                }
            }

            if !*this.running.read().await {
                break;
            }
            debug!("membership sync: resubscribing");
            tokio::time::sleep(this.config.resubscribe_delay).await;
        }

        info!("membership sync stopped");
    }

    /// Fetch a pushed identifier in the background, silently
    fn trigger_backup_fetch(this: &Arc<Distributor>, identifier: SwarmId) {
        let this = this.clone();
        tokio::spawn(async move {
            match this.fetch(&identifier, FetchKind::BackupSync).await {
                Ok(outcome) => {
                    debug!(identifier = %identifier, outcome = ?outcome, "backup fetch done");
                }
                Err(e) => {
                    debug!(identifier = %identifier, error = %e, "backup fetch failed");
                }
            }
        });
    }
}

/// Extract the swarm identifier from a push notification payload.
///
/// The server pushes `{"magnet": "<identifier>"}`; anything else
/// (heartbeats, malformed frames) is ignored.
pub(crate) fn parse_push_message(text: &str) -> Option<SwarmId> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let magnet = value.get("magnet")?.as_str()?;
    if magnet.is_empty() {
        return None;
    }
    Some(magnet.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_push_message() {
        assert_eq!(
            parse_push_message(r#"{"magnet": "magnet:?xt=urn:btih:abc"}"#),
            Some("magnet:?xt=urn:btih:abc".to_string())
        );
    }

    #[test]
    fn test_parse_push_message_rejects_other_shapes() {
        assert_eq!(parse_push_message("not json"), None);
        assert_eq!(parse_push_message(r#"{"ping": 1}"#), None);
        assert_eq!(parse_push_message(r#"{"magnet": 42}"#), None);
        assert_eq!(parse_push_message(r#"{"magnet": ""}"#), None);
        assert_eq!(parse_push_message("[]"), None);
    }
}
