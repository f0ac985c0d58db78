use serde_json::json;
use gatekeep_errors::prelude::*;

#[test]
fn build_and_render_public() {
    let err = ErrorBuilder::new(codes::AUTH_FORBIDDEN)
        .dev_msg("index staging-1 not in allowlist")
        .reason("index")
        .meta_kv("category", json!("search"))
        .correlation("req-123")
        .build();

    let public_view = err.to_public();
    assert_eq!(public_view.code, "AUTH.FORBIDDEN");
    assert_eq!(public_view.reason.as_deref(), Some("index"));
    assert_eq!(public_view.correlation_id.as_deref(), Some("req-123"));
    assert_eq!(err.http_status, 403);

    let labels = labels(&err);
    assert_eq!(labels.get("code").unwrap(), "AUTH.FORBIDDEN");
    assert_eq!(labels.get("reason").unwrap(), "index");
    assert_eq!(labels.get("category").unwrap(), "search");
    assert_eq!(labels.get("status").unwrap(), "403");
}

#[test]
fn public_view_hides_dev_message() {
    let err = ErrorBuilder::new(codes::STORAGE_UNAVAILABLE)
        .dev_msg("connection refused: 127.0.0.1:9200")
        .build();
    let body = serde_json::to_value(err.to_public()).unwrap();
    assert!(body.get("message_dev").is_none());
    assert!(!body.to_string().contains("127.0.0.1"));
    assert_eq!(err.to_audit().message_dev.as_deref(), Some("connection refused: 127.0.0.1:9200"));
}

#[test]
fn status_table_matches_gateway_contract() {
    let cases = [
        (codes::AUTH_UNAUTHENTICATED, 401),
        (codes::AUTH_CREDENTIAL_EXPIRED, 401),
        (codes::AUTH_FORBIDDEN, 403),
        (codes::QUOTA_RATELIMIT, 429),
        (codes::STORAGE_UNAVAILABLE, 503),
        (codes::STORAGE_CONFLICT, 409),
    ];
    for (code, status) in cases {
        assert_eq!(spec_of(code).http_status, status, "{}", code.0);
    }
}

#[test]
fn error_code_deserializes_only_registered_values() {
    let code: ErrorCode = serde_json::from_str("\"QUOTA.RATE_LIMITED\"").unwrap();
    assert_eq!(code, codes::QUOTA_RATELIMIT);
    assert!(serde_json::from_str::<ErrorCode>("\"NOPE.NOPE\"").is_err());
}

#[cfg(feature = "http")]
#[test]
fn http_status_mapping() {
    let err = ErrorBuilder::new(codes::QUOTA_RATELIMIT).build();
    let status = gatekeep_errors::mapping_http::to_http_status(&err);
    assert_eq!(status.as_u16(), 429);
}

#[test]
fn retry_after_survives_serialization() {
    let err = ErrorBuilder::new(codes::QUOTA_RATELIMIT)
        .retry_after(std::time::Duration::from_millis(2_500))
        .build();
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["retry_after_ms"], 2_500);
    let back: ErrorObj = serde_json::from_value(json).unwrap();
    assert_eq!(back.retry_after, err.retry_after);
    assert!(serde_json::to_value(err.to_public()).unwrap().get("retry_after_ms").is_none());
}
