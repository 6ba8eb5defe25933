use serde::Deserialize;
use thiserror::Error;

use crate::models::submission::Attachment;
use crate::models::toggles::ToggleState;
use crate::repositories::BoxFuture;

/// Failures the pipeline classifies on. The gateway maps its richer error
/// type down to this taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Credential refresh failed; the caller must force a sign-out.
    #[error("session expired, sign-in required")]
    AuthExpired,

    /// No response reached the server. Recoverable by retry.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    ServerError(u16),
}

/// The assembled `/chats/ask` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AskRequest {
    pub question: String,
    pub toggles: ToggleState,
    pub chat_id: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskResponse {
    pub chat_id: String,
    pub answer: String,
    #[serde(default)]
    pub source_documents: Vec<SourceDocument>,
}

/// The seam between the submission pipeline and the network. The HTTP
/// implementation lives in `insight-client`; tests use scripted mocks.
pub trait ChatTransport: Send + Sync + 'static {
    fn ask(&self, request: AskRequest)
    -> BoxFuture<'static, Result<AskResponse, TransportError>>;
}
