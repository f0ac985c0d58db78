use std::collections::BTreeMap;

use crate::events::{AuthDecisionEvent, QuotaEvent};

pub fn labels(event: &AuthDecisionEvent) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    map.insert("identity", event.identity.clone());
    map.insert("category", event.category.to_string());
    map.insert("acl", event.acl.to_string());
    map.insert("allow", event.allow.to_string());
    if let Some(reason) = &event.reason {
        map.insert("reason", reason.clone());
    }
    map
}

pub fn quota_labels(event: &QuotaEvent) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    map.insert("identity", event.identity.clone());
    map.insert("category", event.category.to_string());
    map.insert("limit", event.limit.to_string());
    map.insert("outcome", event.outcome.to_string());
    map
}
