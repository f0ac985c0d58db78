use serde::{Deserialize, Serialize};

/// Dotted path into the config tree, e.g. `store.users_index`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPath(pub String);

impl KeyPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// True when `self` is `other` or one of its ancestors. `**` covers everything.
    pub fn covers(&self, other: &KeyPath) -> bool {
        self.0 == "**"
            || self.0 == other.0
            || other
                .0
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Keys whose values must never be printed.
    pub fn is_sensitive(&self) -> bool {
        self.segments()
            .last()
            .is_some_and(|leaf| SENSITIVE_LEAVES.iter().any(|s| leaf.ends_with(s)))
    }
}

const SENSITIVE_LEAVES: &[&str] = &["password", "secret", "token"];

pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Which layer set a key, and where in that layer it came from
/// (a file path, an environment variable, a command-line argument).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub key: KeyPath,
    pub layer: Layer,
    pub origin: String,
}

/// Config layers, lowest precedence first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Defaults,
    File,
    Alias,
    Env,
    Cli,
}

/// Hex SHA-256 of the merged tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum(pub String);

impl Checksum {
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_ancestors_only() {
        let store = KeyPath::new("store");
        assert!(store.covers(&KeyPath::new("store.url")));
        assert!(!store.covers(&KeyPath::new("storefront")));
        assert!(KeyPath::new("**").covers(&KeyPath::new("logs.dir")));
    }

    #[test]
    fn password_keys_are_sensitive() {
        assert!(KeyPath::new("bootstrap.password").is_sensitive());
        assert!(!KeyPath::new("bootstrap.username").is_sensitive());
    }
}
