pub mod code;
pub mod kind;
pub mod labels;
#[cfg(feature = "http")]
pub mod mapping_http;
pub mod model;
pub mod prelude;
pub mod render;
pub mod retry;
pub mod severity;
mod wrap;
