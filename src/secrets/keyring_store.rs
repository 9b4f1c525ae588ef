use keyring::Entry;

use super::store::{SecretStore, SecretStoreError};

/// OS-backed secret storage using the `keyring` crate (Keychain/Credential Manager/Secret Service).
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, id: &str) -> Result<Entry, SecretStoreError> {
        Entry::new(&self.service, id).map_err(|err| map_error(id, err))
    }
}

fn map_error(id: &str, err: keyring::Error) -> SecretStoreError {
    match err {
        keyring::Error::NoEntry => SecretStoreError::NotFound(id.to_string()),
        keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
            SecretStoreError::Unavailable(err.to_string())
        }
        other => SecretStoreError::Store(other.to_string()),
    }
}

impl SecretStore for KeyringSecretStore {
    fn retrieve(&self, id: &str) -> Result<Vec<u8>, SecretStoreError> {
        let secret = self
            .entry(id)?
            .get_password()
            .map_err(|err| map_error(id, err))?;
        Ok(secret.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_maps_to_not_found() {
        let err = map_error("svc-terraform", keyring::Error::NoEntry);
        assert!(matches!(err, SecretStoreError::NotFound(id) if id == "svc-terraform"));
    }

    #[test]
    fn other_failures_map_to_store_error() {
        let err = map_error("svc", keyring::Error::TooLong("user".into(), 255));
        assert!(matches!(err, SecretStoreError::Store(_)));
    }
}
