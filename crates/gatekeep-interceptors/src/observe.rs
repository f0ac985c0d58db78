use crate::context::InterceptContext;
use gatekeep_auth::prelude::Grants;
use std::collections::BTreeMap;

pub fn labels(cx: &InterceptContext, code: Option<&str>) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    if !cx.request_id.is_empty() {
        map.insert("request_id", cx.request_id.clone());
    }
    if let Some(classification) = &cx.classification {
        map.insert("category", classification.category.as_str().to_string());
        map.insert("acl", classification.acl.to_string());
    }
    if let Some(credential) = &cx.credential {
        map.insert("identity", credential.identity().to_string());
    }
    if let Some(c) = code {
        map.insert("code", c.to_string());
    }
    map
}
