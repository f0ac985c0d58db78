use super::*;
use crate::errors::invalid;

/// `--section.key=value` overrides (the leading `--` is optional).
/// Positional arguments without `=` are skipped; a bare `--key` is an error.
pub struct CliArgsSource {
    pub args: Vec<String>,
}

impl CliArgsSource {
    pub fn new(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait::async_trait]
impl Source for CliArgsSource {
    fn id(&self) -> &'static str {
        "cli"
    }

    async fn load(&self) -> Result<SourceSnapshot, ConfigError> {
        let mut out = SourceSnapshot::default();
        for arg in &self.args {
            let flagged = arg.strip_prefix("--");
            let body = flagged.unwrap_or(arg);
            let Some((key, value)) = body.split_once('=') else {
                if flagged.is_some() {
                    return Err(invalid("cli", &format!("override {arg} needs a value")));
                }
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key.split('.').any(str::is_empty) {
                return Err(invalid("cli", &format!("malformed override key in {arg}")));
            }
            out.set(key, access::coerce_scalar(value), Layer::Cli, format!("--{key}"));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_both_spellings_and_skips_positionals() {
        let src = CliArgsSource::new(["--store.url=http://a:9200", "auth.cache_ttl_ms=5", "serve"]);
        let out = src.load().await.unwrap();
        assert_eq!(out.map["store"]["url"], "http://a:9200");
        assert_eq!(out.map["auth"]["cache_ttl_ms"], 5);
        assert_eq!(out.provenance.len(), 2);
    }

    #[tokio::test]
    async fn bare_flag_is_rejected() {
        assert!(CliArgsSource::new(["--store.url"]).load().await.is_err());
        assert!(CliArgsSource::new(["--store..url=x"]).load().await.is_err());
    }
}
