use gatekeep_errors::prelude::*;
use thiserror::Error;

/// Failure of a credential-store round trip. Wraps the shared error object so
/// the auth layer can remap it by code.
#[derive(Debug, Error)]
#[error("{}: {}", .0.code.0, .0.message_dev.as_deref().unwrap_or(.0.message_user.as_str()))]
pub struct StorageError(pub Box<ErrorObj>);

fn build(code: ErrorCode, user: &str, dev: &str) -> StorageError {
    StorageError(Box::new(
        ErrorBuilder::new(code).user_msg(user).dev_msg(dev).build(),
    ))
}

impl StorageError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn code(&self) -> ErrorCode {
        self.0.code
    }

    pub fn is_not_found(&self) -> bool {
        self.0.code == codes::STORAGE_NOT_FOUND
    }

    pub fn is_conflict(&self) -> bool {
        self.0.code == codes::STORAGE_CONFLICT
    }

    /// Tags the error with the index or table it came from.
    pub fn in_store(mut self, store: &str) -> Self {
        self.0
            .meta
            .insert("store".into(), serde_json::Value::String(store.to_string()));
        self
    }

    pub fn not_found(msg: &str) -> Self {
        build(codes::STORAGE_NOT_FOUND, "Record not found.", msg)
    }

    pub fn conflict(msg: &str) -> Self {
        build(codes::STORAGE_CONFLICT, "A record with this name already exists.", msg)
    }

    pub fn unavailable(msg: &str) -> Self {
        build(codes::STORAGE_UNAVAILABLE, "Credential store unavailable.", msg)
    }

    pub fn bad_request(msg: &str) -> Self {
        build(codes::SCHEMA_VALIDATION, "Credential store rejected the request.", msg)
    }

    pub fn internal(msg: &str) -> Self {
        build(codes::UNKNOWN_INTERNAL, "Credential store returned an unreadable record.", msg)
    }

    /// Maps a non-success cluster status. Auth failures against the cluster
    /// mean the gateway itself is misconfigured, so they count as unavailable.
    pub fn from_status(status: u16, detail: &str) -> Self {
        match status {
            404 => Self::not_found(detail),
            409 => Self::conflict(detail),
            401 | 403 => Self::unavailable(detail),
            s if s >= 500 => Self::unavailable(detail),
            _ => Self::bad_request(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_statuses_map_to_store_codes() {
        assert!(StorageError::from_status(404, "gone").is_not_found());
        assert!(StorageError::from_status(409, "dup").is_conflict());
        assert_eq!(StorageError::from_status(403, "denied").code(), codes::STORAGE_UNAVAILABLE);
        assert_eq!(StorageError::from_status(502, "bad").code(), codes::STORAGE_UNAVAILABLE);
        assert_eq!(StorageError::from_status(400, "query").code(), codes::SCHEMA_VALIDATION);
    }

    #[test]
    fn store_tag_lands_in_meta() {
        let err = StorageError::unavailable("refused").in_store(".users");
        assert_eq!(err.0.meta_str("store"), Some(".users"));
        assert!(err.to_string().contains("refused"));
    }
}
