use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use insight_core::repositories::{KeyValueRepository, RepositoryResult};

const ACCESS_TOKEN_KEY: &str = "auth.access_token";
const REFRESH_TOKEN_KEY: &str = "auth.refresh_token";
const IDENTITY_KEY: &str = "auth.identity";
const SESSION_ID_KEY: &str = "auth.session_id";

/// Identity attributes cached alongside the tokens at login and carried
/// forward unchanged through credential refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub username: String,
    pub display_name: String,
    pub role_name: String,
    pub role_id: String,
}

/// The bearer credential used to authenticate outbound calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub identity: Identity,
}

/// Holds the current credential in the persisted client-side store.
///
/// No business logic lives here: written at login and refresh, cleared at
/// logout or when a refresh attempt fails. Only the gateway writes it
/// outside of explicit login/logout.
#[derive(Clone)]
pub struct CredentialStore {
    repository: Arc<dyn KeyValueRepository>,
}

impl CredentialStore {
    pub fn new(repository: Arc<dyn KeyValueRepository>) -> Self {
        Self { repository }
    }

    pub async fn set(&self, credential: &Credential) -> RepositoryResult<()> {
        self.repository
            .set(
                ACCESS_TOKEN_KEY,
                Value::String(credential.access_token.clone()),
            )
            .await?;

        match &credential.refresh_token {
            Some(token) => {
                self.repository
                    .set(REFRESH_TOKEN_KEY, Value::String(token.clone()))
                    .await?
            }
            None => self.repository.remove(REFRESH_TOKEN_KEY).await?,
        }

        self.repository
            .set(IDENTITY_KEY, serde_json::to_value(&credential.identity)?)
            .await
    }

    /// Read the stored credential. Returns `None` when either the access
    /// token or the identity record is missing.
    pub async fn get(&self) -> RepositoryResult<Option<Credential>> {
        let Some(access) = self.repository.get(ACCESS_TOKEN_KEY).await? else {
            return Ok(None);
        };
        let Some(access_token) = access.as_str().map(str::to_string) else {
            return Ok(None);
        };

        let identity = match self.repository.get(IDENTITY_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => return Ok(None),
        };

        let refresh_token = self
            .repository
            .get(REFRESH_TOKEN_KEY)
            .await?
            .and_then(|v| v.as_str().map(str::to_string));

        Ok(Some(Credential {
            access_token,
            refresh_token,
            identity,
        }))
    }

    pub async fn remove(&self) -> RepositoryResult<()> {
        self.repository.remove(ACCESS_TOKEN_KEY).await?;
        self.repository.remove(REFRESH_TOKEN_KEY).await?;
        self.repository.remove(IDENTITY_KEY).await?;
        self.repository.remove(SESSION_ID_KEY).await
    }

    pub async fn set_session_id(&self, session_id: Uuid) -> RepositoryResult<()> {
        self.repository
            .set(SESSION_ID_KEY, Value::String(session_id.to_string()))
            .await
    }

    pub async fn session_id(&self) -> RepositoryResult<Option<Uuid>> {
        Ok(self
            .repository
            .get(SESSION_ID_KEY)
            .await?
            .and_then(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::repositories::InMemoryKeyValueRepository;

    fn test_identity() -> Identity {
        Identity {
            username: "jdoe".to_string(),
            display_name: "J. Doe".to_string(),
            role_name: "analyst".to_string(),
            role_id: "7".to_string(),
        }
    }

    fn test_credential() -> Credential {
        Credential {
            access_token: "tok-1".to_string(),
            refresh_token: Some("ref-1".to_string()),
            identity: test_identity(),
        }
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let store = CredentialStore::new(Arc::new(InMemoryKeyValueRepository::new()));
        store.set(&test_credential()).await.unwrap();

        assert_eq!(store.get().await.unwrap(), Some(test_credential()));
    }

    #[tokio::test]
    async fn test_get_without_credential_returns_none() {
        let store = CredentialStore::new(Arc::new(InMemoryKeyValueRepository::new()));
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_without_refresh_token_drops_previous_one() {
        let store = CredentialStore::new(Arc::new(InMemoryKeyValueRepository::new()));
        store.set(&test_credential()).await.unwrap();

        let mut renewed = test_credential();
        renewed.refresh_token = None;
        store.set(&renewed).await.unwrap();

        assert_eq!(store.get().await.unwrap().unwrap().refresh_token, None);
    }

    #[tokio::test]
    async fn test_remove_clears_everything() {
        let repo = Arc::new(InMemoryKeyValueRepository::new());
        let store = CredentialStore::new(repo.clone());
        store.set(&test_credential()).await.unwrap();
        store.set_session_id(Uuid::new_v4()).await.unwrap();

        store.remove().await.unwrap();

        assert_eq!(store.get().await.unwrap(), None);
        assert_eq!(store.session_id().await.unwrap(), None);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_session_id_roundtrip() {
        let store = CredentialStore::new(Arc::new(InMemoryKeyValueRepository::new()));
        let id = Uuid::new_v4();
        store.set_session_id(id).await.unwrap();

        assert_eq!(store.session_id().await.unwrap(), Some(id));
    }
}
