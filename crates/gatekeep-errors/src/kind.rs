#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Auth,
    Schema,
    RateLimit,
    Storage,
    NotFound,
    Conflict,
    Provider,
    Timeout,
    Config,
    Unknown,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Auth => "Auth",
            ErrorKind::Schema => "Schema",
            ErrorKind::RateLimit => "RateLimit",
            ErrorKind::Storage => "Storage",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Provider => "Provider",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Config => "Config",
            ErrorKind::Unknown => "Unknown",
        }
    }
}
