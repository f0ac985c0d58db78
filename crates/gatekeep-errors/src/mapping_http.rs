use crate::{code::codes, model::ErrorObj};
use http::{header, HeaderName, HeaderValue, StatusCode};

pub const BASIC_CHALLENGE: &str = r#"Basic realm="gatekeep""#;

pub fn to_http_status(err: &ErrorObj) -> StatusCode {
    StatusCode::from_u16(err.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Headers a client needs to act on the error: a Basic challenge on 401 and
/// `Retry-After` (whole seconds, rounded up, at least 1) on 429.
pub fn challenge_headers(err: &ErrorObj) -> Vec<(HeaderName, HeaderValue)> {
    let mut headers = Vec::new();
    if err.code == codes::AUTH_UNAUTHENTICATED || err.code == codes::AUTH_CREDENTIAL_EXPIRED {
        headers.push((
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(BASIC_CHALLENGE),
        ));
    }
    if err.code == codes::QUOTA_RATELIMIT {
        let millis = err.retry_after.map(|d| d.as_millis() as u64).unwrap_or(0);
        let secs = millis.div_ceil(1000).max(1);
        headers.push((header::RETRY_AFTER, HeaderValue::from(secs)));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ErrorBuilder;
    use std::time::Duration;

    #[test]
    fn retry_after_rounds_up() {
        let err = ErrorBuilder::new(codes::QUOTA_RATELIMIT)
            .retry_after(Duration::from_millis(1_200))
            .build();
        let headers = challenge_headers(&err);
        assert_eq!(headers, vec![(header::RETRY_AFTER, HeaderValue::from(2u64))]);
    }

    #[test]
    fn sub_second_wait_still_asks_for_one() {
        let err = ErrorBuilder::new(codes::QUOTA_RATELIMIT)
            .retry_after(Duration::from_millis(3))
            .build();
        assert_eq!(challenge_headers(&err)[0].1, "1");
    }

    #[test]
    fn forbidden_needs_no_headers() {
        let err = ErrorBuilder::new(codes::AUTH_FORBIDDEN).build();
        assert!(challenge_headers(&err).is_empty());
        assert_eq!(to_http_status(&err), StatusCode::FORBIDDEN);
    }
}
