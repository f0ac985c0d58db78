use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::AuthError;

pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// How a stored secret is encoded. Records written before hashing existed
/// carry an empty marker and hold the secret verbatim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordHashType {
    #[default]
    #[serde(rename = "")]
    Plain,
    #[serde(rename = "bcrypt")]
    Bcrypt,
}

pub fn hash_password(secret: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(secret, cost).map_err(|e| AuthError::Invalid(format!("cannot hash password: {e}")))
}

/// Checks `secret` against `stored`. Never short-circuits on content.
pub fn verify_password(kind: PasswordHashType, secret: &str, stored: &str) -> bool {
    match kind {
        PasswordHashType::Plain => stored.as_bytes().ct_eq(secret.as_bytes()).into(),
        PasswordHashType::Bcrypt => match bcrypt::verify(secret, stored) {
            Ok(ok) => ok,
            Err(err) => {
                tracing::warn!(target: "gatekeep::auth", error = %err, "stored bcrypt hash is unreadable");
                false
            }
        },
    }
}

/// bcrypt is deliberately slow; keep it off the async workers.
pub async fn verify_password_blocking(
    kind: PasswordHashType,
    secret: String,
    stored: String,
) -> Result<bool, AuthError> {
    if kind == PasswordHashType::Plain {
        return Ok(verify_password(kind, &secret, &stored));
    }
    tokio::task::spawn_blocking(move || verify_password(kind, &secret, &stored))
        .await
        .map_err(|e| AuthError::StoreUnavailable(format!("password check aborted: {e}")))
}

pub async fn hash_password_blocking(secret: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&secret, cost))
        .await
        .map_err(|e| AuthError::StoreUnavailable(format!("password hashing aborted: {e}")))?
}

/// Digest kept by the credential cache so a hit can skip bcrypt.
pub(crate) fn secret_digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_compare() {
        assert!(verify_password(PasswordHashType::Plain, "bar", "bar"));
        assert!(!verify_password(PasswordHashType::Plain, "baz", "bar"));
        assert!(!verify_password(PasswordHashType::Plain, "barr", "bar"));
    }

    #[test]
    fn bcrypt_round_trip() {
        let hash = hash_password("s3cret", 4).unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password(PasswordHashType::Bcrypt, "s3cret", &hash));
        assert!(!verify_password(PasswordHashType::Bcrypt, "other", &hash));
        assert!(!verify_password(PasswordHashType::Bcrypt, "s3cret", "not-a-hash"));
    }

    #[test]
    fn hash_type_wire_tokens() {
        assert_eq!(serde_json::to_string(&PasswordHashType::Plain).unwrap(), r#""""#);
        let t: PasswordHashType = serde_json::from_str(r#""bcrypt""#).unwrap();
        assert_eq!(t, PasswordHashType::Bcrypt);
    }
}
