use zeroize::Zeroizing;

use super::{
    store::{SecretStore, SecretStoreError},
    types::CredentialSet,
};
use crate::core::error::IssuanceError;

pub const USERNAME_ENV: &str = "SECTIGO_CM_USER";
pub const PASSWORD_ENV: &str = "SECTIGO_CM_PASSWORD";
pub const CUSTOMER_URI_ENV: &str = "SECTIGO_CM_URI";
pub const KEYRING_SERVICE: &str = "sectigo-certctl";

/// Resolves credentials from the environment. When the password variable is
/// unset, the keyring entry named after the username is consulted.
pub fn resolve_credentials<F>(
    lookup: F,
    fallback: Option<&dyn SecretStore>,
) -> Result<CredentialSet, IssuanceError>
where
    F: Fn(&str) -> Option<String>,
{
    let username = required_env(&lookup, "username", USERNAME_ENV)?;
    let customer_uri = required_env(&lookup, "customer_uri", CUSTOMER_URI_ENV)?;

    let password = match env_value(&lookup, PASSWORD_ENV) {
        Some(password) => Zeroizing::new(password),
        None => {
            let store = fallback.ok_or_else(|| missing("password", PASSWORD_ENV))?;
            let bytes = Zeroizing::new(store.retrieve(&username).map_err(|err| match err {
                SecretStoreError::NotFound(_) => missing("password", PASSWORD_ENV),
                other => IssuanceError::Secret(other.to_string()),
            })?);
            let password = std::str::from_utf8(&bytes).map_err(|_| {
                IssuanceError::Secret("stored password is not valid UTF-8".to_string())
            })?;
            log::debug!("[secrets] password for {username} resolved from keyring");
            Zeroizing::new(password.replace('\r', ""))
        }
    };

    Ok(CredentialSet {
        username,
        password,
        customer_uri,
    })
}

fn env_value<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.replace('\r', ""))
        .filter(|value| !value.is_empty())
}

fn required_env<F>(lookup: &F, param: &str, key: &str) -> Result<String, IssuanceError>
where
    F: Fn(&str) -> Option<String>,
{
    env_value(lookup, key).ok_or_else(|| missing(param, key))
}

fn missing(param: &str, key: &str) -> IssuanceError {
    IssuanceError::Configuration(format!(
        "{param} variable {key:?} not set or empty; set it in the environment and try again"
    ))
}
