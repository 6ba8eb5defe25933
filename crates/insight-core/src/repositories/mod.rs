pub mod error;
pub mod in_memory_repository;
pub mod json_file_repository;
pub mod key_value_repository;

pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_repository::InMemoryKeyValueRepository;
pub use json_file_repository::JsonFileKeyValueRepository;
pub use key_value_repository::{BoxFuture, KeyValueRepository};
