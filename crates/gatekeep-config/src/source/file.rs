use super::*;
use crate::errors::{invalid, unreadable};
use std::path::{Path, PathBuf};

/// JSON, YAML or TOML files, merged in order. Format follows the extension.
pub struct FileSource {
    pub paths: Vec<PathBuf>,
}

#[async_trait::async_trait]
impl Source for FileSource {
    fn id(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<SourceSnapshot, ConfigError> {
        let mut out = SourceSnapshot::default();
        for path in &self.paths {
            let content = std::fs::read_to_string(path)
                .map_err(|e| unreadable("file", &format!("{}: {e}", path.display())))?;
            match parse(path, &content)? {
                Value::Object(tree) => {
                    out.merge_tree(tree, Layer::File, path.display().to_string())
                }
                // an empty yaml document
                Value::Null => {}
                other => {
                    return Err(invalid(
                        "file",
                        &format!("{}: expected a mapping at top level, got {other}", path.display()),
                    ))
                }
            }
        }
        Ok(out)
    }
}

fn parse(path: &Path, content: &str) -> Result<Value, ConfigError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let fail = |e: &dyn std::fmt::Display| invalid("file", &format!("{}: {e}", path.display()));
    match ext {
        "json" => serde_json::from_str::<Value>(content).map_err(|e| fail(&e)),
        #[cfg(feature = "yaml")]
        "yml" | "yaml" => serde_yaml::from_str::<Value>(content).map_err(|e| fail(&e)),
        #[cfg(feature = "toml")]
        "toml" => {
            let parsed: toml::Value = toml::from_str(content).map_err(|e| fail(&e))?;
            serde_json::to_value(parsed).map_err(|e| fail(&e))
        }
        other => Err(invalid(
            "file",
            &format!("{}: unsupported extension {other:?}", path.display()),
        )),
    }
}
