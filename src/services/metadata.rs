//! Metadata extractor adapter
//!
//! Invokes the external extraction tool on the original (pre-encryption)
//! file and ships the structured record, tagged with content digest and
//! swarm identifier, to the indexing service.
//!
//! Everything here is best-effort: a failed extraction yields an empty
//! record, and no failure anywhere in this module ever blocks or fails a
//! publish.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use super::session::Session;

/// Adapter around the external `extract` tool and the indexing endpoint
pub struct MetadataService {
    http: reqwest::Client,
    base_url: String,
    extract_command: String,
    session: Arc<Session>,
}

impl MetadataService {
    /// Create a metadata client sharing the distributor's session
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        extract_command: String,
        session: Arc<Session>,
    ) -> Self {
        Self {
            http,
            base_url,
            extract_command,
            session,
        }
    }

    /// Extract metadata from the original file and post it to the index.
    ///
    /// `published_path` names the encrypted artifact (its file name is what
    /// peers see); `original_path` is the plaintext the extractor reads.
    pub async fn submit(
        &self,
        original_path: &Path,
        published_path: &Path,
        magnet: &str,
        is_directory: bool,
        digest: &str,
    ) {
        let mut record = self.extract(original_path).await;

        let filename = published_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = tokio::fs::metadata(original_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        record.insert("filename".to_string(), json!(filename));
        record.insert("magnetLink".to_string(), json!(magnet));
        record.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        record.insert("isDirectory".to_string(), json!(is_directory));
        record.insert("hash".to_string(), json!(digest));
        record.insert("size".to_string(), json!(size));

        let Some(token) = self.session.ensure_valid_token().await else {
            warn!("no access token, skipping metadata indexing");
            return;
        };

        let result = self
            .http
            .post(format!("{}/api/index-metadata/", self.base_url))
            .bearer_auth(token)
            .json(&Value::Object(record))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(hash = digest, "metadata indexed");
            }
            Ok(response) => {
                warn!(status = %response.status(), "metadata indexing rejected");
            }
            Err(e) => {
                warn!(error = %e, "metadata indexing unreachable");
            }
        }
    }

    /// Run the external extraction tool; empty record on any failure
    async fn extract(&self, path: &Path) -> Map<String, Value> {
        let output = Command::new(&self.extract_command)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                parse_extract_output(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!(
                    code = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "metadata extraction exited nonzero"
                );
                Map::new()
            }
            Err(e) => {
                warn!(error = %e, command = %self.extract_command, "metadata extraction failed to spawn");
                Map::new()
            }
        }
    }
}

/// Parse the extraction tool's ` key - value` lines into a record.
///
/// The first line is the tool's banner and is skipped; lines without a
/// ` - ` separator are ignored.
fn parse_extract_output(output: &str) -> Map<String, Value> {
    let mut record = Map::new();
    for line in output.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, " - ");
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        if !key.is_empty() && !value.is_empty() {
            record.insert(key.to_string(), json!(value));
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_banner_line() {
        let output = "Keywords for file report.pdf:\n\
                      mimetype - application/pdf\n\
                      title - Quarterly Report\n";
        let record = parse_extract_output(output);
        assert_eq!(record.len(), 2);
        assert_eq!(record["mimetype"], json!("application/pdf"));
        assert_eq!(record["title"], json!("Quarterly Report"));
    }

    #[test]
    fn test_parse_value_containing_separator() {
        let output = "banner\n\
                      title - Notes - Draft 3\n";
        let record = parse_extract_output(output);
        assert_eq!(record["title"], json!("Notes - Draft 3"));
    }

    #[test]
    fn test_parse_ignores_malformed_lines() {
        let output = "banner\n\
                      no separator here\n\
                      \n\
                      author - someone\n";
        let record = parse_extract_output(output);
        assert_eq!(record.len(), 1);
        assert_eq!(record["author"], json!("someone"));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_extract_output("").is_empty());
        assert!(parse_extract_output("banner only\n").is_empty());
    }
}
