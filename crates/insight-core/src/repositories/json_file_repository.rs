use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::error::{RepositoryError, RepositoryResult};
use super::key_value_repository::{BoxFuture, KeyValueRepository};

/// File-backed key/value store: a single JSON object persisted under the
/// user's config directory. Writes are atomic (temp file + rename) so a
/// crash mid-save never leaves a truncated store behind.
pub struct JsonFileKeyValueRepository {
    file_path: PathBuf,
}

impl JsonFileKeyValueRepository {
    /// Create a repository with the XDG-compliant default path.
    pub fn new() -> RepositoryResult<Self> {
        let config_dir = dirs::config_dir().ok_or(RepositoryError::NoConfigDir)?;
        let file_path = config_dir.join("insight-chat").join("store.json");

        Ok(Self { file_path })
    }

    /// Create a repository backed by an explicit file path.
    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    fn read_map(path: &Path) -> RepositoryResult<BTreeMap<String, Value>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let map = serde_json::from_str(&contents)?;
        Ok(map)
    }

    fn write_map(path: &Path, map: &BTreeMap<String, Value>) -> RepositoryResult<()> {
        let json = serde_json::to_string_pretty(map)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &json)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Run a read-modify-write cycle against the store on the blocking pool.
    async fn update_map<F>(path: PathBuf, apply: F) -> RepositoryResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, Value>) + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let mut map = Self::read_map(&path)?;
            apply(&mut map);
            Self::write_map(&path, &map)
        })
        .await
        .map_err(|e| RepositoryError::TaskJoin(e.to_string()))?
    }
}

impl KeyValueRepository for JsonFileKeyValueRepository {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<Value>>> {
        let path = self.file_path.clone();
        let key = key.to_string();

        Box::pin(async move {
            let map = tokio::task::spawn_blocking(move || Self::read_map(&path))
                .await
                .map_err(|e| RepositoryError::TaskJoin(e.to_string()))??;

            Ok(map.get(&key).cloned())
        })
    }

    fn set(&self, key: &str, value: Value) -> BoxFuture<'static, RepositoryResult<()>> {
        let key = key.to_string();
        let fut = Self::update_map(self.file_path.clone(), move |map| {
            map.insert(key, value);
        });

        Box::pin(fut)
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let key = key.to_string();
        let fut = Self::update_map(self.file_path.clone(), move |map| {
            map.remove(&key);
        });

        Box::pin(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_repo() -> (tempfile::TempDir, JsonFileKeyValueRepository) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let repo = JsonFileKeyValueRepository::with_path(dir.path().join("store.json"));
        (dir, repo)
    }

    #[tokio::test]
    async fn test_get_missing_key_returns_none() {
        let (_dir, repo) = temp_repo();
        let value = repo.get("auth.access_token").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let (_dir, repo) = temp_repo();
        repo.set("prefs.insight_modes", json!({"company": true}))
            .await
            .unwrap();

        let value = repo.get("prefs.insight_modes").await.unwrap();
        assert_eq!(value, Some(json!({"company": true})));
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let (_dir, repo) = temp_repo();
        repo.set("k", json!(1)).await.unwrap();
        repo.set("k", json!(2)).await.unwrap();

        assert_eq!(repo.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_remove_deletes_value() {
        let (_dir, repo) = temp_repo();
        repo.set("k", json!("v")).await.unwrap();
        repo.remove("k").await.unwrap();

        assert!(repo.get("k").await.unwrap().is_none());

        // Removing an absent key is a no-op
        repo.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_values_survive_new_repository_instance() {
        let (dir, repo) = temp_repo();
        repo.set("auth.access_token", json!("tok-1")).await.unwrap();

        let reopened = JsonFileKeyValueRepository::with_path(dir.path().join("store.json"));
        assert_eq!(
            reopened.get("auth.access_token").await.unwrap(),
            Some(json!("tok-1"))
        );
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind_after_save() {
        let (dir, repo) = temp_repo();
        repo.set("k", json!("v")).await.unwrap();

        assert!(!dir.path().join("store.json.tmp").exists());
        assert!(dir.path().join("store.json").exists());
    }
}
