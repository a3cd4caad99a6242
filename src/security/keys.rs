//! Group key resolution
//!
//! Symmetric keys come from the external key service, fetched fresh for
//! every encrypt or decrypt call. Nothing here caches: a `GroupKeyRef`
//! lives for exactly one transform and is dropped. On any failure the
//! calling pipeline step aborts; we never fall back to a zero or default
//! key, and retry policy belongs to the caller.

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::distributor::error::DistributorError;

/// AES-128 key length in bytes
pub const KEY_LEN: usize = 16;

/// Ephemeral key reference: the lookup that produced it plus the raw key.
///
/// Lifetime is a single encrypt or decrypt call; never persisted.
#[derive(Clone)]
pub struct GroupKeyRef {
    /// The group id or content digest this key was resolved for
    pub group_or_digest: String,
    /// Raw AES-128 key bytes
    pub symmetric_key: [u8; KEY_LEN],
}

impl std::fmt::Debug for GroupKeyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupKeyRef")
            .field("group_or_digest", &self.group_or_digest)
            .field("symmetric_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct KeyResponse {
    aes_key: String,
}

/// Client for the external group key service
#[derive(Clone)]
pub struct KeyService {
    http: reqwest::Client,
    base_url: String,
}

impl KeyService {
    /// Create a key service client for the given coordination server
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    /// Resolve the key for publishing into a group
    pub async fn resolve_for_publish(&self, group_id: &str) -> Result<GroupKeyRef, DistributorError> {
        let url = format!("{}/api/groups/groupkeys/{}/", self.base_url, group_id);
        self.fetch_key(&url, group_id).await
    }

    /// Resolve the key for decrypting a fetched artifact by content digest
    pub async fn resolve_for_fetch(&self, digest: &str) -> Result<GroupKeyRef, DistributorError> {
        let url = format!("{}/api/groups/keys/{}/", self.base_url, digest);
        self.fetch_key(&url, digest).await
    }

    async fn fetch_key(&self, url: &str, lookup: &str) -> Result<GroupKeyRef, DistributorError> {
        debug!(lookup = lookup, "resolving group key");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DistributorError::KeyUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DistributorError::Unauthorized);
            }
            status if !status.is_success() => {
                return Err(DistributorError::KeyUnavailable(format!(
                    "key service returned {}",
                    status
                )));
            }
            _ => {}
        }

        let body: KeyResponse = response
            .json()
            .await
            .map_err(|e| DistributorError::KeyUnavailable(format!("malformed key response: {}", e)))?;

        Ok(GroupKeyRef {
            group_or_digest: lookup.to_string(),
            symmetric_key: decode_key(&body.aes_key)?,
        })
    }
}

/// Decode a hex key string into raw AES-128 key bytes
fn decode_key(hex_key: &str) -> Result<[u8; KEY_LEN], DistributorError> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| DistributorError::KeyUnavailable(format!("key is not hex: {}", e)))?;
    if bytes.len() != KEY_LEN {
        return Err(DistributorError::KeyUnavailable(format!(
            "key has {} bytes, expected {}",
            bytes.len(),
            KEY_LEN
        )));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_key_valid() {
        let key = decode_key("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(key[0], 0x01);
        assert_eq!(key[15], 0xef);
    }

    #[test]
    fn test_decode_key_trims_whitespace() {
        let key = decode_key(" 00112233445566778899aabbccddeeff\n").unwrap();
        assert_eq!(key[15], 0xff);
    }

    #[test]
    fn test_decode_key_wrong_length() {
        let result = decode_key("0011");
        assert!(matches!(result, Err(DistributorError::KeyUnavailable(_))));
    }

    #[test]
    fn test_decode_key_not_hex() {
        let result = decode_key("zz23456789abcdef0123456789abcdef");
        assert!(matches!(result, Err(DistributorError::KeyUnavailable(_))));
    }

    #[test]
    fn test_key_ref_debug_redacts_key() {
        let key_ref = GroupKeyRef {
            group_or_digest: "g1".to_string(),
            symmetric_key: [0xab; KEY_LEN],
        };
        let debug = format!("{:?}", key_ref);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("171"));
    }
}
