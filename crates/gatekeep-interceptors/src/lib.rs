pub mod adapters;
pub mod audit;
pub mod classify;
pub mod context;
pub mod errors;
pub mod observe;
pub mod plugin;
pub mod prelude;
pub mod router;
pub mod stages;
pub mod upstream;

pub use stages::{InterceptorChain, Stage, StageOutcome};
