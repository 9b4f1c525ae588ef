use thiserror::Error;

/// Errors produced by secret storage backends.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
    #[error("secret store error: {0}")]
    Store(String),
}

/// Read access to stored secrets, keyed by account name.
pub trait SecretStore {
    fn retrieve(&self, id: &str) -> Result<Vec<u8>, SecretStoreError>;
}
