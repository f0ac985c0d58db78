use gatekeep_errors::prelude::*;
use thiserror::Error;

/// Boot-time configuration failure. Every variant carries `CONFIG.INVALID`;
/// the failing phase is kept in the `phase` meta entry.
#[derive(Debug, Error)]
#[error("{}", .0.message_dev.as_deref().unwrap_or(.0.message_user.as_str()))]
pub struct ConfigError(pub Box<ErrorObj>);

impl ConfigError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn phase(&self) -> Option<&str> {
        self.0.meta_str("phase")
    }
}

fn config_error(user: &str, phase: &str, detail: &str) -> ConfigError {
    ConfigError(Box::new(
        ErrorBuilder::new(codes::CONFIG_INVALID)
            .user_msg(user)
            .dev_msg(format!("{phase}: {detail}"))
            .meta_kv("phase", serde_json::Value::String(phase.to_string()))
            .build(),
    ))
}

/// A value or document that cannot be parsed, merged or typed.
pub fn invalid(phase: &str, detail: &str) -> ConfigError {
    config_error("Configuration is invalid.", phase, detail)
}

/// A file or secret that cannot be read.
pub fn unreadable(phase: &str, detail: &str) -> ConfigError {
    config_error("Configuration source is unreadable.", phase, detail)
}
