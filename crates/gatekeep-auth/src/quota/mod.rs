use async_trait::async_trait;
use gatekeep_types::prelude::Category;

use crate::errors::AuthError;
use crate::model::{Credential, Grants, QuotaKey, QuotaOutcome, RateLimit};

pub mod sliding;

pub use sliding::SlidingWindowLimiter;

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Admits one request against `limit`, or reports when to retry. Rejections
    /// leave the bucket as it was.
    async fn check_and_consume(
        &self,
        key: &QuotaKey,
        limit: &RateLimit,
    ) -> Result<QuotaOutcome, AuthError>;
}

/// Decides which limit, if any, applies to a credential and category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub user_default: Option<RateLimit>,
    pub permission_default: Option<RateLimit>,
}

impl RateLimitPolicy {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn limit_for(&self, credential: &Credential, category: Category) -> Option<RateLimit> {
        match credential {
            Credential::User(_) => self.user_default,
            Credential::Permission(p) => p.limit_for(category).or(self.permission_default),
        }
    }
}
