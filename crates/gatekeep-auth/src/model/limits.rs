use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// At most `count` admissions in any window of length `window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub count: u32,
    #[serde(with = "duration_str")]
    pub window: Duration,
}

impl RateLimit {
    pub fn new(count: u32, window: Duration) -> Self {
        Self { count, window }
    }
}

/// Durations on the wire: humantime strings (`"1m"`, `"250ms"`) or integer seconds.
pub mod duration_str {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| serde::de::Error::custom(format!("invalid duration {text:?}: {e}"))),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }
}

/// Permission TTL. Zero, negative or missing means the credential never expires.
pub mod ttl_str {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ttl) => serializer.serialize_str(&humantime::format_duration(*ttl).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<Raw>::deserialize(deserializer)?;
        let ttl = match raw {
            None => return Ok(None),
            Some(Raw::Secs(secs)) if secs <= 0 => return Ok(None),
            Some(Raw::Secs(secs)) => Duration::from_secs(secs as u64),
            Some(Raw::Text(text)) => {
                let text = text.trim();
                if text.is_empty() || text.starts_with('-') {
                    return Ok(None);
                }
                humantime::parse_duration(text).map_err(|e| {
                    serde::de::Error::custom(format!("invalid ttl {text:?}: {e}"))
                })?
            }
        };
        Ok((!ttl.is_zero()).then_some(ttl))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(i64),
        Text(String),
    }
}

/// Parses a TTL the way the wire format does; used by management requests.
pub fn parse_ttl(raw: &str) -> Result<Option<Duration>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('-') {
        return Ok(None);
    }
    let ttl = humantime::parse_duration(raw).map_err(|e| format!("invalid ttl {raw:?}: {e}"))?;
    Ok((!ttl.is_zero()).then_some(ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(default, with = "ttl_str")]
        ttl: Option<Duration>,
    }

    #[test]
    fn ttl_accepts_humantime_and_seconds() {
        let h: Holder = serde_json::from_str(r#"{"ttl":"1h"}"#).unwrap();
        assert_eq!(h.ttl, Some(Duration::from_secs(3600)));
        let h: Holder = serde_json::from_str(r#"{"ttl":90}"#).unwrap();
        assert_eq!(h.ttl, Some(Duration::from_secs(90)));
    }

    #[test]
    fn non_positive_ttl_never_expires() {
        for raw in [r#"{"ttl":0}"#, r#"{"ttl":-5}"#, r#"{"ttl":"-1h"}"#, r#"{"ttl":"0s"}"#, "{}"] {
            let h: Holder = serde_json::from_str(raw).unwrap();
            assert_eq!(h.ttl, None, "{raw}");
        }
        assert!(serde_json::from_str::<Holder>(r#"{"ttl":"soon"}"#).is_err());
    }

    #[test]
    fn rate_limit_window_is_humantime() {
        let limit: RateLimit = serde_json::from_str(r#"{"count":5,"window":"1m"}"#).unwrap();
        assert_eq!(limit, RateLimit::new(5, Duration::from_secs(60)));
        let json = serde_json::to_value(limit).unwrap();
        assert_eq!(json["window"], "1m");
    }
}
