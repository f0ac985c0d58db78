use crate::errors::{invalid, unreadable, ConfigError};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Resolves `secret://<resolver>/<name>` references found in config values.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    fn id(&self) -> &'static str;
    async fn resolve(&self, uri: &str) -> Result<Value, ConfigError>;
}

fn name_in<'a>(uri: &'a str, resolver: &str) -> Result<&'a str, ConfigError> {
    uri.strip_prefix("secret://")
        .and_then(|rest| rest.strip_prefix(resolver))
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| invalid("secret", &format!("{uri} is not a {resolver} secret")))
}

/// `secret://env/NAME` reads `NAME` from the process environment.
pub struct EnvSecretResolver;

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    fn id(&self) -> &'static str {
        "env"
    }

    async fn resolve(&self, uri: &str) -> Result<Value, ConfigError> {
        let name = name_in(uri, self.id())?;
        std::env::var(name)
            .map(Value::String)
            .map_err(|_| unreadable("secret", &format!("environment variable {name} is not set")))
    }
}

/// `secret://file/<name>` reads `<root>/<name>`, trailing newline stripped.
/// Suits mounted secret volumes.
pub struct FileSecretResolver {
    pub root: PathBuf,
}

#[async_trait]
impl SecretResolver for FileSecretResolver {
    fn id(&self) -> &'static str {
        "file"
    }

    async fn resolve(&self, uri: &str) -> Result<Value, ConfigError> {
        let name = name_in(uri, self.id())?;
        if name.split('/').any(|seg| seg == "..") {
            return Err(invalid("secret", &format!("{uri} escapes the secrets directory")));
        }
        let path = self.root.join(name);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| unreadable("secret", &format!("{}: {e}", path.display())))?;
        Ok(Value::String(raw.trim_end_matches(['\r', '\n']).to_string()))
    }
}

pub fn is_secret_ref(value: &Value) -> Option<&str> {
    value.as_str().and_then(|s| s.strip_prefix("secret://"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn file_secrets_are_read_and_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("master")).unwrap();
        writeln!(f, "hunter2").unwrap();
        let resolver = FileSecretResolver {
            root: dir.path().to_path_buf(),
        };
        let value = resolver.resolve("secret://file/master").await.unwrap();
        assert_eq!(value, Value::String("hunter2".into()));
        assert!(resolver.resolve("secret://file/../etc/passwd").await.is_err());
        assert!(resolver.resolve("secret://env/master").await.is_err());
    }
}
