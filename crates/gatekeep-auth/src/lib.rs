pub mod authn;
pub mod cache;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod observe;
pub mod password;
pub mod pdp;
pub mod prelude;
pub mod quota;
pub mod store;

use gatekeep_types::prelude::Category;
use prelude::*;
use std::sync::Arc;

/// Authentication, authorization and rate limiting behind one handle.
///
/// The chain calls the steps one by one so each can short-circuit; [`AuthFacade::check`]
/// runs them back to back.
#[derive(Clone)]
pub struct AuthFacade {
    pub authenticator: Arc<dyn Authenticator>,
    pub authorizer: Arc<dyn Authorizer>,
    pub quota: Arc<dyn QuotaStore>,
    pub limits: RateLimitPolicy,
}

impl AuthFacade {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        authorizer: Arc<dyn Authorizer>,
        quota: Arc<dyn QuotaStore>,
        limits: RateLimitPolicy,
    ) -> Self {
        Self {
            authenticator,
            authorizer,
            quota,
            limits,
        }
    }

    /// Grant evaluation and a fresh sliding-window limiter over `store`.
    pub fn with_store(store: Arc<dyn CredentialStore>, limits: RateLimitPolicy) -> Self {
        Self::new(
            Arc::new(CredentialResolver::new(store)),
            Arc::new(GrantEvaluator),
            Arc::new(SlidingWindowLimiter::new()),
            limits,
        )
    }

    pub async fn authenticate(&self, input: &BasicCredentials) -> Result<Credential, AuthError> {
        let result = self.authenticator.authenticate(input).await;
        if let Err(err) = &result {
            tracing::debug!(target: "gatekeep::auth", user = %input.username, error = %err, "authentication rejected");
        }
        result
    }

    /// Full grant evaluation.
    pub async fn authorize(
        &self,
        credential: &Credential,
        request: &AuthzRequest,
    ) -> Result<(), AuthError> {
        self.authorize_checks(credential, request, &Check::ALL).await
    }

    pub async fn authorize_checks(
        &self,
        credential: &Credential,
        request: &AuthzRequest,
        checks: &[Check],
    ) -> Result<(), AuthError> {
        let result = self.authorizer.decide(credential, request, checks).await;
        let reason = result.as_ref().err().map(AuthError::reason_token);
        let event = AuthDecisionEvent::new(
            credential.identity(),
            credential.kind(),
            &request.classification,
            reason,
        );
        let labels = observe::labels(&event);
        if event.allow {
            tracing::debug!(target: "gatekeep::auth", ?labels, ?checks, "authorized");
        } else {
            tracing::info!(target: "gatekeep::auth", ?labels, ?checks, "denied");
        }
        result
    }

    /// Consumes one admission for `(credential, category)` when a limit applies.
    /// Returns the remaining budget, or `None` when unlimited.
    pub async fn consume_quota(
        &self,
        credential: &Credential,
        category: Category,
    ) -> Result<Option<u32>, AuthError> {
        let Some(limit) = self.limits.limit_for(credential, category) else {
            return Ok(None);
        };
        let key = QuotaKey::new(credential.identity(), category);
        let outcome = self.quota.check_and_consume(&key, &limit).await?;
        match outcome {
            QuotaOutcome::Allowed { remaining } => Ok(Some(remaining)),
            QuotaOutcome::RateLimited { retry_after } => {
                let event = QuotaEvent {
                    identity: key.identity,
                    category,
                    limit: limit.count,
                    outcome: "rate_limited",
                };
                tracing::info!(target: "gatekeep::auth", labels = ?observe::quota_labels(&event), ?retry_after, "rate limited");
                Err(AuthError::RateLimited {
                    category,
                    retry_after,
                })
            }
        }
    }

    pub async fn check(
        &self,
        input: &BasicCredentials,
        request: &AuthzRequest,
    ) -> Result<Credential, AuthError> {
        let credential = self.authenticate(input).await?;
        self.authorize(&credential, request).await?;
        self.consume_quota(&credential, request.classification.category)
            .await?;
        Ok(credential)
    }
}
