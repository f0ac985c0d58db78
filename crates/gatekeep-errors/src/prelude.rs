pub use crate::{
    code::{codes, spec_of, CodeSpec, ErrorCode, SPECS},
    kind::ErrorKind,
    labels::labels,
    model::{ErrorBuilder, ErrorObj},
    render::{AuditErrorView, PublicErrorView},
    retry::RetryClass,
    severity::Severity,
};

#[cfg(feature = "http")]
pub use crate::mapping_http::{challenge_headers, to_http_status};
