pub mod keyring_store;
pub mod resolver;
pub mod store;
pub mod types;

pub use resolver::{KEYRING_SERVICE, resolve_credentials};
pub use types::CredentialSet;
