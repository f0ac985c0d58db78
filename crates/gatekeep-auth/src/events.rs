use gatekeep_types::prelude::*;
use serde::Serialize;

use crate::model::{Classification, CredentialKind};

/// Outcome of one authorization check, as written to the decision log.
#[derive(Clone, Debug, Serialize)]
pub struct AuthDecisionEvent {
    pub identity: String,
    pub kind: CredentialKind,
    pub category: Category,
    pub acl: Acl,
    pub ops: OpSet,
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuthDecisionEvent {
    pub fn new(
        identity: &str,
        kind: CredentialKind,
        classification: &Classification,
        reason: Option<&str>,
    ) -> Self {
        Self {
            identity: identity.to_string(),
            kind,
            category: classification.category,
            acl: classification.acl,
            ops: classification.ops,
            allow: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct QuotaEvent {
    pub identity: String,
    pub category: Category,
    pub limit: u32,
    pub outcome: &'static str,
}
