//! Elasticsearch-backed repository.
//!
//! Every write carries `refresh=wait_for` so a document is searchable as soon as
//! the call returns; the credential store relies on that for read-after-write.

mod config;
mod repo;

pub use config::ElasticConfig;
pub use repo::ElasticRepository;
