use crate::{
    access,
    errors::ConfigError,
    model::{ConfigMap, KeyPath, Layer, ProvenanceEntry},
};
use async_trait::async_trait;
use serde_json::Value;

pub mod cli;
pub mod env;
pub mod file;

/// Keys one source contributed, plus where each came from.
#[derive(Clone, Debug, Default)]
pub struct SourceSnapshot {
    pub map: ConfigMap,
    pub provenance: Vec<ProvenanceEntry>,
}

impl SourceSnapshot {
    pub fn set(&mut self, key: &str, value: Value, layer: Layer, origin: impl Into<String>) {
        access::set_path(&mut self.map, key, value);
        self.provenance.push(ProvenanceEntry {
            key: KeyPath::new(key),
            layer,
            origin: origin.into(),
        });
    }

    pub fn merge_tree(&mut self, tree: ConfigMap, layer: Layer, origin: impl Into<String>) {
        access::merge_object(&mut self.map, tree);
        self.provenance.push(ProvenanceEntry {
            key: KeyPath::new("**"),
            layer,
            origin: origin.into(),
        });
    }
}

#[async_trait]
pub trait Source: Send + Sync {
    fn id(&self) -> &'static str;
    async fn load(&self) -> Result<SourceSnapshot, ConfigError>;
}
