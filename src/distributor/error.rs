//! Distributor errors

use std::path::PathBuf;

/// Errors that can occur in the distribution pipeline
#[derive(Debug)]
pub enum DistributorError {
    /// Source path disappeared before the scan completed (skip, not fatal)
    SourceMissing(PathBuf),
    /// Source is a directory with no contents (skip, not fatal)
    EmptyDirectory(PathBuf),
    /// Directories cannot be published directly; only pre-encrypted trees
    /// already under the share root are seeded (reconciliation path)
    DirectorySource(PathBuf),
    /// The key service could not supply a group key
    KeyUnavailable(String),
    /// The key service (or session layer) rejected our credentials
    Unauthorized,
    /// Ciphertext or compressed stream is corrupt or truncated
    DecodeFailure(String),
    /// The swarm engine reported a failure for a transfer
    SwarmEngine(String),
    /// External safety scan rejected the file
    ScanRejected(PathBuf),
    /// No session token available for an operation that requires one
    NoSession,
    /// The path is not currently offered to the swarm
    NotShared(PathBuf),
    /// Distributor is not running
    NotRunning,
    /// IO error
    Io(String),
}

impl std::fmt::Display for DistributorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributorError::SourceMissing(p) => {
                write!(f, "source missing: {}", p.display())
            }
            DistributorError::EmptyDirectory(p) => {
                write!(f, "empty directory: {}", p.display())
            }
            DistributorError::DirectorySource(p) => {
                write!(f, "cannot publish a directory: {}", p.display())
            }
            DistributorError::KeyUnavailable(e) => write!(f, "group key unavailable: {}", e),
            DistributorError::Unauthorized => write!(f, "unauthorized"),
            DistributorError::DecodeFailure(e) => write!(f, "decode failure: {}", e),
            DistributorError::SwarmEngine(e) => write!(f, "swarm engine error: {}", e),
            DistributorError::ScanRejected(p) => {
                write!(f, "safety scan rejected: {}", p.display())
            }
            DistributorError::NoSession => write!(f, "no session token available"),
            DistributorError::NotShared(p) => write!(f, "not shared: {}", p.display()),
            DistributorError::NotRunning => write!(f, "distributor is not running"),
            DistributorError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for DistributorError {}

impl From<std::io::Error> for DistributorError {
    fn from(e: std::io::Error) -> Self {
        DistributorError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DistributorError::Unauthorized;
        assert_eq!(err.to_string(), "unauthorized");

        let err = DistributorError::NotRunning;
        assert_eq!(err.to_string(), "distributor is not running");

        let err = DistributorError::KeyUnavailable("service returned 500".to_string());
        assert_eq!(err.to_string(), "group key unavailable: service returned 500");

        let err = DistributorError::DecodeFailure("bad padding".to_string());
        assert_eq!(err.to_string(), "decode failure: bad padding");

        let err = DistributorError::SwarmEngine("tracker timeout".to_string());
        assert_eq!(err.to_string(), "swarm engine error: tracker timeout");

        let err = DistributorError::NoSession;
        assert_eq!(err.to_string(), "no session token available");
    }

    #[test]
    fn test_display_paths() {
        let err = DistributorError::SourceMissing(PathBuf::from("/tmp/gone.pdf"));
        assert_eq!(err.to_string(), "source missing: /tmp/gone.pdf");

        let err = DistributorError::EmptyDirectory(PathBuf::from("/tmp/empty"));
        assert_eq!(err.to_string(), "empty directory: /tmp/empty");

        let err = DistributorError::DirectorySource(PathBuf::from("/tmp/album"));
        assert_eq!(err.to_string(), "cannot publish a directory: /tmp/album");

        let err = DistributorError::NotShared(PathBuf::from("/tmp/file"));
        assert_eq!(err.to_string(), "not shared: /tmp/file");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: DistributorError = io.into();
        assert!(matches!(err, DistributorError::Io(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_is_error_trait() {
        let err: Box<dyn std::error::Error> = Box::new(DistributorError::Unauthorized);
        assert!(!err.to_string().is_empty());
    }
}
