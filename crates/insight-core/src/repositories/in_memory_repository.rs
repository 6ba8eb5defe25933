use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::error::RepositoryResult;
use super::key_value_repository::{BoxFuture, KeyValueRepository};

/// In-memory key/value store for tests and ephemeral sessions.
#[derive(Default, Clone)]
pub struct InMemoryKeyValueRepository {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryKeyValueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys. Test helper.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueRepository for InMemoryKeyValueRepository {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<Value>>> {
        let value = self.entries.read().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: Value) -> BoxFuture<'static, RepositoryResult<()>> {
        self.entries.write().insert(key.to_string(), value);
        Box::pin(async move { Ok(()) })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        self.entries.write().remove(key);
        Box::pin(async move { Ok(()) })
    }
}
