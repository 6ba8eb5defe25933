//! Typed endpoints over the authenticated gateway.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use insight_core::models::toggles::ToggleState;
use insight_core::repositories::BoxFuture;
use insight_core::transport::{AskRequest, AskResponse, ChatTransport, TransportError};

use crate::credentials::{Credential, CredentialStore, Identity};
use crate::gateway::{AuthGateway, GatewayError, MultipartField, RequestSpec};

/// User verdict on one assistant answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Positive,
    Negative,
}

impl Feedback {
    fn as_wire(self) -> &'static str {
        match self {
            Feedback::Positive => "1",
            Feedback::Negative => "-1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A full conversation as returned by `GET /chats/{id}`, including the
/// toggle selection recorded when the conversation was created.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatDetail {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub toggles: Option<ToggleState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    identity: Identity,
}

/// The chat endpoints, each one `RequestSpec` through the gateway.
#[derive(Clone)]
pub struct ChatApi {
    gateway: Arc<AuthGateway>,
}

impl ChatApi {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    fn store(&self) -> &CredentialStore {
        self.gateway.store()
    }

    /// Exchange username and password for a credential, store it and mint a
    /// fresh session id.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, GatewayError> {
        let spec = RequestSpec::post_json(
            "/auth/login",
            json!({ "username": username, "password": password }),
        );
        let response = self.gateway.send_unauthenticated(spec).await?;
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedBody(e.to_string()))?;

        let credential = Credential {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            identity: body.identity.clone(),
        };
        self.store().set(&credential).await?;
        self.store().set_session_id(Uuid::new_v4()).await?;
        info!(username = %body.identity.username, "Signed in");

        Ok(body.identity)
    }

    /// Terminate the session. The local credential is cleared even when the
    /// server call fails, so a broken backend can never trap the user in a
    /// signed-in state.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        let session_id = self.store().session_id().await?;
        let body = match session_id {
            Some(id) => json!({ "sessionId": id.to_string() }),
            None => json!({}),
        };

        let result = self.gateway.send(RequestSpec::post_json("/logout", body)).await;
        self.store().remove().await?;

        match result {
            Ok(_) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Server-side logout failed, local credential cleared anyway");
                Err(e)
            }
        }
    }

    /// Submit a question, with the toggle flags and any encoded attachments,
    /// to `/chats/ask`.
    pub async fn ask(&self, request: &AskRequest) -> Result<AskResponse, GatewayError> {
        let mut fields = vec![
            MultipartField::text("question", request.question.clone()),
            MultipartField::text("is_browse", request.toggles.browse().to_string()),
            MultipartField::text("is_company", request.toggles.company().to_string()),
            MultipartField::text("is_general", request.toggles.general().to_string()),
        ];

        if let Some(chat_id) = &request.chat_id {
            fields.push(MultipartField::text("chat_id", chat_id.clone()));
        }

        for attachment in &request.attachments {
            let bytes = attachment
                .payload_bytes()
                .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
            fields.push(MultipartField::file(
                "with_document",
                attachment.name.clone(),
                attachment.mime_type.clone(),
                bytes,
            ));
        }

        let response = self
            .gateway
            .send(RequestSpec::post_multipart("/chats/ask", fields))
            .await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedBody(e.to_string()))
    }

    pub async fn feedback(&self, chat_id: &str, verdict: Feedback) -> Result<(), GatewayError> {
        let spec = RequestSpec::patch_json(
            format!("/chats/feedback/{chat_id}"),
            json!({ "feedback": verdict.as_wire() }),
        );
        self.gateway.send(spec).await?;
        Ok(())
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, GatewayError> {
        let response = self.gateway.send(RequestSpec::get("/chats")).await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedBody(e.to_string()))
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<ChatDetail, GatewayError> {
        let response = self
            .gateway
            .send(RequestSpec::get(format!("/chats/{chat_id}")))
            .await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedBody(e.to_string()))
    }

    pub async fn delete_chat(&self, chat_id: &str) -> Result<(), GatewayError> {
        self.gateway
            .send(RequestSpec::delete(format!("/chats/{chat_id}")))
            .await?;
        Ok(())
    }

    pub async fn bulk_delete(&self, chat_ids: &[String]) -> Result<(), GatewayError> {
        let spec = RequestSpec::post_json("/chats/bulk-delete", json!({ "ids": chat_ids }));
        self.gateway.send(spec).await?;
        Ok(())
    }
}

impl ChatTransport for ChatApi {
    fn ask(
        &self,
        request: AskRequest,
    ) -> BoxFuture<'static, Result<AskResponse, TransportError>> {
        let api = self.clone();
        Box::pin(async move { api.ask(&request).await.map_err(TransportError::from) })
    }
}
