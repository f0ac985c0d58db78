pub mod errors;
pub mod model;
pub mod observe;
pub mod prelude;

pub mod spi {
    pub mod repo;

    pub use repo::*;
}

#[cfg(feature = "elastic")]
pub mod elastic;
#[cfg(feature = "mock")]
pub mod mock;

pub use errors::StorageError;
pub use model::*;
pub use spi::*;
