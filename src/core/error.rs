use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while issuing, collecting or revoking a certificate.
#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("configuration invalid: {0}")]
    Configuration(String),
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("CSR build failed: {0}")]
    CsrBuild(String),
    #[error("certificate manager protocol error: {0}")]
    CaProtocol(String),
    #[error("certificate manager unreachable: {0}")]
    Transport(String),
    #[error("certificate manager rejected the request (code {code}): {description}")]
    PermanentRejection { code: i64, description: String },
    #[error("certificate not issued after waiting {waited_secs}s (last code {last_code})")]
    TimeoutExceeded { last_code: i64, waited_secs: u64 },
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("secret error: {0}")]
    Secret(String),
}

impl IssuanceError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IssuanceError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether a caller may reasonably try the same operation again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IssuanceError::Transport(_) | IssuanceError::TimeoutExceeded { .. }
        )
    }
}
