//! Gateway configuration: layered defaults, files, environment and CLI overrides,
//! frozen into a [`GatewayConfig`].

use gatekeep_auth::prelude::{RateLimit, RateLimitPolicy, DEFAULT_BCRYPT_COST};
use gatekeep_config::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Prefix for `GATEKEEP__SECTION__KEY` variables.
pub const ENV_PREFIX: &str = "GATEKEEP";

/// Where `secret://file/NAME` references are read from.
pub const SECRETS_DIR: &str = "/run/secrets";

/// Environment names older deployments already set.
pub const ENV_ALIASES: [(&str, &str); 4] = [
    ("ES_CLUSTER_URL", "store.url"),
    ("USERNAME", "bootstrap.username"),
    ("PASSWORD", "bootstrap.password"),
    ("LOGS_ES_INDEX", "logs.index"),
];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub store: StoreConfig,
    pub bootstrap: BootstrapConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub ratelimit: RateLimitConfig,
    pub logs: LogsConfig,
    pub server: ServerConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Cluster holding users and permissions. Unset keeps them in memory.
    #[serde(default)]
    pub url: Option<String>,
    pub users_index: String,
    pub permissions_index: String,
    pub timeout_ms: u64,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    /// Resolved credentials are reused for this long; 0 disables the cache.
    pub cache_ttl_ms: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub user_default: Option<RateLimit>,
    #[serde(default)]
    pub permission_default: Option<RateLimit>,
}

impl RateLimitConfig {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            user_default: self.user_default,
            permission_default: self.permission_default,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Name of the audit log; daily files are called `<index>.<date>.ndjson`.
    pub index: String,
    pub dir: PathBuf,
    /// Records kept in memory for `GET /_logs`.
    pub memory_capacity: usize,
}

impl LogsConfig {
    pub fn file_prefix(&self) -> &str {
        match self.index.trim_start_matches('.') {
            "" => "logs",
            name => name,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    #[serde(with = "humantime_str")]
    pub request_timeout: Duration,
    /// Take the client address from `X-Forwarded-For`.
    pub trust_forwarded_for: bool,
}

mod humantime_str {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Secs(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => humantime::parse_duration(&text)
                .map_err(|e| serde::de::Error::custom(format!("invalid duration {text:?}: {e}"))),
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
        }
    }
}

pub fn defaults() -> serde_json::Value {
    serde_json::json!({
        "store": {
            "users_index": ".users",
            "permissions_index": ".permissions",
            "timeout_ms": 10_000
        },
        "bootstrap": { "username": "foo", "password": "bar" },
        "auth": { "bcrypt_cost": DEFAULT_BCRYPT_COST, "cache_ttl_ms": 0 },
        "ratelimit": {},
        "logs": { "index": ".logs", "dir": "./logs", "memory_capacity": 10_000 },
        "server": {
            "listen": "0.0.0.0:8000",
            "request_timeout": "30s",
            "trust_forwarded_for": false
        }
    })
}

/// Defaults, then `files` in order, then aliased and prefixed environment variables,
/// then `--key=value` overrides. Values may be `secret://env/NAME` or
/// `secret://file/NAME` (read from [`SECRETS_DIR`]) references.
pub fn loader(files: Vec<PathBuf>, overrides: Vec<String>) -> Loader {
    Loader {
        defaults: defaults(),
        sources: vec![
            Arc::new(FileSource { paths: files }) as Arc<dyn Source>,
            Arc::new(EnvAliasSource::new(ENV_ALIASES)) as Arc<dyn Source>,
            Arc::new(EnvSource {
                prefix: ENV_PREFIX.into(),
                separator: "__".into(),
            }) as Arc<dyn Source>,
            Arc::new(CliArgsSource::new(overrides)) as Arc<dyn Source>,
        ],
        secrets: vec![
            Arc::new(EnvSecretResolver) as Arc<dyn SecretResolver>,
            Arc::new(FileSecretResolver {
                root: PathBuf::from(SECRETS_DIR),
            }) as Arc<dyn SecretResolver>,
        ],
        validator: Arc::new(TypedValidator::<GatewayConfig>::new()),
    }
}

pub async fn load(
    files: Vec<PathBuf>,
    overrides: Vec<String>,
) -> Result<(GatewayConfig, ConfigSnapshot), ConfigError> {
    let snapshot = loader(files, overrides).load_once().await?;
    let config = snapshot.typed::<GatewayConfig>()?;
    tracing::debug!(
        target: "gatekeep::config",
        checksum = snapshot.checksum().short(),
        store = config.store.url.as_deref().unwrap_or("memory"),
        "configuration loaded"
    );
    Ok((config, snapshot))
}
