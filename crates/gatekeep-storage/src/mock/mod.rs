pub mod datastore;
pub mod repo;

pub use datastore::MockDatastore;
pub use repo::InMemoryRepository;
