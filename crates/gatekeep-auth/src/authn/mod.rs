use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

use crate::errors::AuthError;
use crate::model::Credential;

pub mod resolver;

pub use resolver::CredentialResolver;

/// `user:secret` pair carried by an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub secret: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Parses the raw header value. Anything but a well-formed Basic pair fails.
    pub fn from_header(value: &str) -> Result<Self, AuthError> {
        let malformed = || AuthError::AuthenticationFailed("malformed authorization header".into());
        let (scheme, encoded) = value.trim().split_once(' ').ok_or_else(malformed)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthError::AuthenticationFailed(format!(
                "unsupported authorization scheme {scheme:?}"
            )));
        }
        let decoded = STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
        let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
        let (username, secret) = decoded.split_once(':').ok_or_else(malformed)?;
        if username.is_empty() {
            return Err(malformed());
        }
        Ok(Self::new(username, secret))
    }

    pub fn to_header(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.username, self.secret))
        )
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, input: &BasicCredentials) -> Result<Credential, AuthError>;
}
