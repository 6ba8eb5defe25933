use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use super::error::RepositoryResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable client-side key/value store.
///
/// Backs both the credential store and the toggle-preference store. Values
/// are opaque JSON; callers own the semantics of each key.
pub trait KeyValueRepository: Send + Sync + 'static {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<Value>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> BoxFuture<'static, RepositoryResult<()>>;

    /// Remove the value stored under `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>>;
}
