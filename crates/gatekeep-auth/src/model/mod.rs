use gatekeep_types::prelude::*;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

pub mod credential;
pub mod limits;
pub mod permission;
pub mod user;

pub use credential::{Credential, CredentialKind, Grants};
pub use limits::{parse_ttl, RateLimit};
pub use permission::Permission;
pub use user::User;

/// What a request asks for, as decided by the classifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub acl: Acl,
    pub ops: OpSet,
    /// Target indices as written in the request. Empty means cluster-wide.
    #[serde(default)]
    pub indices: Vec<String>,
}

impl Classification {
    pub fn new(category: Category, acl: Acl, ops: OpSet) -> Self {
        Self {
            category,
            acl,
            ops,
            indices: Vec::new(),
        }
    }

    pub fn with_indices<I, S>(mut self, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices = indices.into_iter().map(Into::into).collect();
        self
    }
}

/// Where the request came from; only consulted for Permission credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    pub remote_ip: Option<IpAddr>,
    pub referer: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AuthzRequest {
    pub classification: Classification,
    pub origin: RequestOrigin,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QuotaKey {
    pub identity: String,
    pub category: Category,
}

impl QuotaKey {
    pub fn new(identity: impl Into<String>, category: Category) -> Self {
        Self {
            identity: identity.into(),
            category,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaOutcome {
    Allowed { remaining: u32 },
    RateLimited { retry_after: Duration },
}
