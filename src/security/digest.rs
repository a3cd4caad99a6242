//! Content hashing
//!
//! SHA-256 digests used as file identity: dedup key, key-service lookup key
//! and search-index primary key. Must be stable across restarts, so the
//! output is the canonical lowercase hex encoding.

use std::io::Read;
use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::distributor::error::DistributorError;
use crate::distributor::types::Digest;

/// Read buffer size for streaming digests
const DIGEST_BUF_SIZE: usize = 8 * 1024;

/// Compute the SHA-256 digest of a byte slice as lowercase hex
pub fn digest_bytes(bytes: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 digest of a file's bytes as lowercase hex
///
/// Streams the file in bounded chunks so file size does not bound memory.
pub fn digest_file(path: &Path) -> Result<Digest, DistributorError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; DIGEST_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
