#[cfg(feature = "wrap-reqwest")]
use crate::{
    code::{codes, ErrorCode},
    model::{ErrorBuilder, ErrorObj},
};

#[cfg(feature = "wrap-reqwest")]
impl From<reqwest::Error> for ErrorObj {
    fn from(e: reqwest::Error) -> Self {
        let code: ErrorCode = if e.is_timeout() {
            codes::UPSTREAM_TIMEOUT
        } else {
            codes::UPSTREAM_UNAVAILABLE
        };
        ErrorBuilder::new(code)
            .dev_msg(format!("reqwest: {e}"))
            .meta_kv("provider", serde_json::json!("http"))
            .build()
    }
}
