use super::*;

/// `PREFIX__SECTION__KEY=value` → `section.key`.
pub struct EnvSource {
    pub prefix: String,
    pub separator: String,
}

impl EnvSource {
    fn key_for(&self, var: &str) -> Option<String> {
        let rest = var.strip_prefix(&self.prefix)?.strip_prefix(&self.separator)?;
        let key = rest
            .split(&self.separator)
            .filter(|seg| !seg.is_empty())
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join(".");
        (!key.is_empty()).then_some(key)
    }
}

#[async_trait::async_trait]
impl Source for EnvSource {
    fn id(&self) -> &'static str {
        "env"
    }

    async fn load(&self) -> Result<SourceSnapshot, ConfigError> {
        let mut out = SourceSnapshot::default();
        let mut vars: Vec<_> = std::env::vars().collect();
        vars.sort();
        for (var, value) in vars {
            if let Some(key) = self.key_for(&var) {
                out.set(&key, access::coerce_scalar(&value), Layer::Env, var);
            }
        }
        Ok(out)
    }
}

/// Fixed environment names mapped onto config keys, e.g. `ES_CLUSTER_URL` → `store.url`.
/// Values are taken verbatim as strings; empty values are ignored.
pub struct EnvAliasSource {
    pub aliases: Vec<(String, KeyPath)>,
}

impl EnvAliasSource {
    pub fn new<I, A, B>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            aliases: aliases
                .into_iter()
                .map(|(env, key)| (env.into(), KeyPath(key.into())))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl Source for EnvAliasSource {
    fn id(&self) -> &'static str {
        "env-alias"
    }

    async fn load(&self) -> Result<SourceSnapshot, ConfigError> {
        let mut out = SourceSnapshot::default();
        for (env, key) in &self.aliases {
            match std::env::var(env) {
                Ok(value) if !value.is_empty() => {
                    out.set(&key.0, Value::String(value), Layer::Alias, env.clone())
                }
                _ => {}
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_names_fold_to_dotted_keys() {
        let src = EnvSource {
            prefix: "GATEKEEP".into(),
            separator: "__".into(),
        };
        assert_eq!(src.key_for("GATEKEEP__STORE__USERS_INDEX").as_deref(), Some("store.users_index"));
        assert_eq!(src.key_for("GATEKEEPER__X"), None);
        assert_eq!(src.key_for("GATEKEEP__"), None);
    }
}
