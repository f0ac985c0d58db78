use crate::{
    access,
    errors::{invalid, ConfigError},
    model::Layer,
    secrets::{is_secret_ref, SecretResolver},
    snapshot::ConfigSnapshot,
    source::{Source, SourceSnapshot},
    validate::Validator,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;

/// Merges defaults and sources (later wins), resolves secrets, validates, freezes.
pub struct Loader {
    pub defaults: Value,
    pub sources: Vec<Arc<dyn Source>>,
    pub secrets: Vec<Arc<dyn SecretResolver>>,
    pub validator: Arc<dyn Validator>,
}

impl Loader {
    pub async fn load_once(&self) -> Result<ConfigSnapshot, ConfigError> {
        let mut merged = SourceSnapshot::default();
        match &self.defaults {
            Value::Object(map) => merged.merge_tree(map.clone(), Layer::Defaults, "defaults"),
            Value::Null => {}
            other => return Err(invalid("defaults", &format!("expected a mapping, got {other}"))),
        }

        for source in &self.sources {
            let layer = source.load().await?;
            tracing::debug!(
                target: "gatekeep::config",
                source = source.id(),
                keys = layer.provenance.len(),
                "config source loaded"
            );
            access::merge_object(&mut merged.map, layer.map);
            merged.provenance.extend(layer.provenance);
        }

        let mut tree = Value::Object(merged.map);
        resolve_secrets(&mut tree, &self.secrets).await?;
        self.validator.validate_boot(&tree).await?;
        ConfigSnapshot::from_tree(tree, merged.provenance)
    }
}

/// Replaces every `secret://<resolver>/...` string in place. Unknown resolvers
/// and failed lookups abort the load.
fn resolve_secrets<'a>(
    value: &'a mut Value,
    resolvers: &'a [Arc<dyn SecretResolver>],
) -> BoxFuture<'a, Result<(), ConfigError>> {
    async move {
        match value {
            Value::Object(map) => {
                for child in map.values_mut() {
                    resolve_secrets(child, resolvers).await?;
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    resolve_secrets(item, resolvers).await?;
                }
            }
            Value::String(_) => {
                if let Some(rest) = is_secret_ref(value) {
                    let uri = format!("secret://{rest}");
                    let id = rest.split('/').next().unwrap_or_default();
                    let resolver = resolvers
                        .iter()
                        .find(|r| r.id() == id)
                        .ok_or_else(|| invalid("secret", &format!("no resolver named {id:?}")))?;
                    *value = resolver.resolve(&uri).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }
    .boxed()
}

