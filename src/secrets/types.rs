use zeroize::Zeroizing;

/// Certificate manager credentials, sent as the `Login`, `Password` and
/// `Customeruri` headers.
#[derive(Clone)]
pub struct CredentialSet {
    pub username: String,
    pub password: Zeroizing<String>,
    pub customer_uri: String,
}

impl CredentialSet {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        customer_uri: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
            customer_uri: customer_uri.into(),
        }
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("customer_uri", &self.customer_uri)
            .finish()
    }
}
