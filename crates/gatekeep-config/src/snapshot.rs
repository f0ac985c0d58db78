use crate::errors::{invalid, ConfigError};
use crate::model::{Checksum, KeyPath, ProvenanceEntry};
use crate::access;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Immutable, checksummed view of the merged configuration tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    checksum: Checksum,
    tree: Value,
    provenance: Vec<ProvenanceEntry>,
}

impl ConfigSnapshot {
    pub fn from_tree(tree: Value, provenance: Vec<ProvenanceEntry>) -> Result<Self, ConfigError> {
        let bytes = serde_json::to_vec(&tree).map_err(|e| invalid("checksum", &e.to_string()))?;
        let digest = Sha256::digest(&bytes);
        let checksum = digest.iter().map(|b| format!("{b:02x}")).collect();
        Ok(Self {
            checksum: Checksum(checksum),
            tree,
            provenance,
        })
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn provenance(&self) -> &[ProvenanceEntry] {
        &self.provenance
    }

    /// The highest-precedence entry that set `key` or one of its ancestors.
    pub fn origin_of(&self, key: &KeyPath) -> Option<&ProvenanceEntry> {
        self.provenance
            .iter()
            .filter(|entry| entry.key.covers(key))
            .max_by_key(|entry| entry.layer)
    }

    pub fn get_raw(&self, path: &KeyPath) -> Option<&Value> {
        access::get_path(&self.tree, &path.0)
    }

    pub fn get<T: serde::de::DeserializeOwned>(&self, path: &KeyPath) -> Result<T, ConfigError> {
        let value = self
            .get_raw(path)
            .ok_or_else(|| invalid("missing", &path.0))?;
        T::deserialize(value).map_err(|e| invalid("type", &format!("{}: {e}", path.0)))
    }

    /// Deserializes the whole tree into a typed config.
    pub fn typed<T: serde::de::DeserializeOwned>(&self) -> Result<T, ConfigError> {
        T::deserialize(&self.tree).map_err(|e| invalid("type", &e.to_string()))
    }

    /// The tree with every sensitive leaf replaced by `***`, for printing.
    pub fn redacted(&self) -> Value {
        fn mask(value: &mut Value, path: &mut Vec<String>) {
            let Value::Object(map) = value else {
                return;
            };
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                if child.is_string() && KeyPath::new(path.join(".")).is_sensitive() {
                    *child = Value::String("***".into());
                } else {
                    mask(child, path);
                }
                path.pop();
            }
        }
        let mut tree = self.tree.clone();
        mask(&mut tree, &mut Vec::new());
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Layer;
    use serde_json::json;

    fn entry(key: &str, layer: Layer, origin: &str) -> ProvenanceEntry {
        ProvenanceEntry {
            key: KeyPath::new(key),
            layer,
            origin: origin.into(),
        }
    }

    #[test]
    fn redacts_passwords_only() {
        let snapshot = ConfigSnapshot::from_tree(
            json!({"bootstrap": {"username": "foo", "password": "bar"}}),
            vec![],
        )
        .unwrap();
        assert_eq!(
            snapshot.redacted(),
            json!({"bootstrap": {"username": "foo", "password": "***"}})
        );
        assert_eq!(snapshot.checksum().0.len(), 64);
    }

    #[test]
    fn origin_prefers_the_highest_layer() {
        let snapshot = ConfigSnapshot::from_tree(
            json!({"store": {"url": "http://x"}}),
            vec![
                entry("**", Layer::Defaults, "defaults"),
                entry("**", Layer::File, "gatekeep.yaml"),
                entry("store.url", Layer::Alias, "ES_CLUSTER_URL"),
            ],
        )
        .unwrap();
        let origin = snapshot.origin_of(&KeyPath::new("store.url")).unwrap();
        assert_eq!(origin.origin, "ES_CLUSTER_URL");
        let origin = snapshot.origin_of(&KeyPath::new("logs.dir")).unwrap();
        assert_eq!(origin.layer, Layer::File);
    }
}
