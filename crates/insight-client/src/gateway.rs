//! Authenticated request gateway.
//!
//! Every outbound call goes through [`AuthGateway::send`]: the stored bearer
//! credential is attached, a 401 triggers one refresh-then-replay cycle, and
//! failures are classified into the `AuthExpired` / `NetworkUnavailable` /
//! `ServerError` taxonomy the pipeline acts on.
//!
//! Refresh is de-duplicated process-wide: when several requests hit a 401 at
//! the same time, the first caller holding the refresh guard performs the
//! `/auth/refresh` call and the others reuse its result. The stored access
//! token is compared against the one each caller saw fail, so a token pair
//! is never fetched twice and never discarded.

use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use insight_core::repositories::RepositoryError;
use insight_core::transport::TransportError;

use crate::credentials::{Credential, CredentialStore};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credential refresh failed or was impossible; the caller must force a
    /// sign-out and redirect to the sign-in screen.
    #[error("session expired, sign-in required")]
    AuthExpired,

    /// No response reached the server.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    ServerError(u16),

    /// The request could not be assembled (bad mime type, undecodable
    /// attachment payload).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A success response carried a body that failed to parse.
    #[error("unexpected response body: {0}")]
    UnexpectedBody(String),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl From<GatewayError> for TransportError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::AuthExpired => TransportError::AuthExpired,
            GatewayError::NetworkUnavailable(_) => TransportError::NetworkUnavailable,
            GatewayError::ServerError(code) => TransportError::ServerError(code),
            // Local assembly, storage and decode failures are terminal for
            // the attempt and not worth an automatic retry.
            GatewayError::InvalidRequest(_)
            | GatewayError::UnexpectedBody(_)
            | GatewayError::Store(_) => TransportError::ServerError(500),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MultipartValue {
    Text(String),
    File {
        filename: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    pub value: MultipartValue,
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::File {
                filename: filename.into(),
                mime_type: mime_type.into(),
                bytes,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

/// A replayable description of one HTTP call.
///
/// The gateway rebuilds the actual `reqwest` request from this spec on every
/// attempt, so the replay after a credential refresh carries a payload
/// identical to the original.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: RequestBody::Json(body),
        }
    }

    pub fn patch_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PATCH,
            path: path.into(),
            body: RequestBody::Json(body),
        }
    }

    pub fn post_multipart(path: impl Into<String>, fields: Vec<MultipartField>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: RequestBody::Multipart(fields),
        }
    }
}

/// The authenticated request gateway.
pub struct AuthGateway {
    http: reqwest::Client,
    base_url: String,
    store: CredentialStore,
    /// Process-wide refresh guard; see the module docs.
    refresh_lock: Mutex<()>,
}

impl AuthGateway {
    pub fn new(base_url: impl Into<String>, store: CredentialStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_request(
        &self,
        spec: &RequestSpec,
        bearer: Option<&str>,
    ) -> Result<reqwest::RequestBuilder, GatewayError> {
        let mut builder = self.http.request(spec.method.clone(), self.url(&spec.path));

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        match &spec.body {
            RequestBody::Empty => Ok(builder),
            RequestBody::Json(value) => Ok(builder.json(value)),
            RequestBody::Multipart(fields) => {
                let mut form = reqwest::multipart::Form::new();
                for field in fields {
                    form = match &field.value {
                        MultipartValue::Text(text) => form.text(field.name.clone(), text.clone()),
                        MultipartValue::File {
                            filename,
                            mime_type,
                            bytes,
                        } => {
                            let part = reqwest::multipart::Part::bytes(bytes.clone())
                                .file_name(filename.clone())
                                .mime_str(mime_type)
                                .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
                            form.part(field.name.clone(), part)
                        }
                    };
                }
                Ok(builder.multipart(form))
            }
        }
    }

    async fn execute(
        &self,
        spec: &RequestSpec,
        bearer: Option<&str>,
    ) -> Result<Response, GatewayError> {
        let builder = self.build_request(spec, bearer)?;
        builder.send().await.map_err(|e| {
            warn!(path = %spec.path, error = %e, "Request failed before reaching the server");
            GatewayError::NetworkUnavailable(e.to_string())
        })
    }

    fn check_status(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(GatewayError::ServerError(status.as_u16()))
        }
    }

    /// Issue a call without bearer injection or refresh handling.
    ///
    /// Used for the endpoints that establish a session in the first place
    /// (`/auth/login`); a 401 here is an ordinary server error, not an
    /// expired credential.
    pub async fn send_unauthenticated(&self, spec: RequestSpec) -> Result<Response, GatewayError> {
        let response = self.execute(&spec, None).await?;
        Self::check_status(response)
    }

    /// Issue an authenticated call, refreshing and replaying once on 401.
    pub async fn send(&self, spec: RequestSpec) -> Result<Response, GatewayError> {
        let bearer = self.store.get().await?.map(|c| c.access_token);
        let response = self.execute(&spec, bearer.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_status(response);
        }

        info!(path = %spec.path, "Request unauthorized, attempting credential refresh");
        let token = self.refresh_after_unauthorized(bearer.as_deref()).await?;

        // Exactly one replay, rebuilt from the spec with the new bearer. A
        // second 401 means the renewed credential is no good either.
        let replayed = self.execute(&spec, Some(&token)).await?;
        if replayed.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %spec.path, "Replay still unauthorized, forcing sign-out");
            self.store.remove().await?;
            return Err(GatewayError::AuthExpired);
        }
        Self::check_status(replayed)
    }

    /// Renew the credential after a 401, de-duplicated across callers.
    ///
    /// `stale_token` is the bearer the failed request carried; if the stored
    /// token already differs once the guard is acquired, a concurrent caller
    /// refreshed first and its token is reused.
    async fn refresh_after_unauthorized(
        &self,
        stale_token: Option<&str>,
    ) -> Result<String, GatewayError> {
        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.store.get().await? else {
            return Err(GatewayError::AuthExpired);
        };

        if let Some(stale) = stale_token
            && current.access_token != stale
        {
            debug!("Credential already refreshed by a concurrent request");
            return Ok(current.access_token);
        }

        let Some(refresh_token) = current.refresh_token.clone() else {
            warn!("No refresh token available, forcing sign-out");
            self.store.remove().await?;
            return Err(GatewayError::AuthExpired);
        };

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RefreshResponse {
            access_token: String,
        }

        let response = self
            .http
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(|e| GatewayError::NetworkUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Credential refresh rejected, forcing sign-out");
            self.store.remove().await?;
            return Err(GatewayError::AuthExpired);
        }

        let Ok(body) = response.json::<RefreshResponse>().await else {
            self.store.remove().await?;
            return Err(GatewayError::AuthExpired);
        };

        // The refresh endpoint returns only a new access token; the refresh
        // token and cached identity carry forward.
        let renewed = Credential {
            access_token: body.access_token.clone(),
            refresh_token: Some(refresh_token),
            identity: current.identity,
        };
        self.store.set(&renewed).await?;
        info!("Credential refreshed");

        Ok(body.access_token)
    }
}
