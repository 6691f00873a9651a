use crate::domain::models::Credentials;

/// Supplies login credentials when a session must be (re)established.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Credentials;
}

/// Credentials fixed at startup, usually from configuration.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    pub const fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self) -> Credentials {
        self.0.clone()
    }
}
