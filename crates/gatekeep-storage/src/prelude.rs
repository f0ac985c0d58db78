pub use crate::errors::StorageError;
pub use crate::model::{Entity, Page, QueryParams};
pub use crate::spi::repo::Repository;

#[cfg(feature = "mock")]
pub use crate::mock::{InMemoryRepository, MockDatastore};

#[cfg(feature = "elastic")]
pub use crate::elastic::{ElasticConfig, ElasticRepository};
