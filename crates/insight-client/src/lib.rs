//! HTTP layer for the Insight chat client.
//!
//! [`AuthGateway`] wraps every outbound call: it injects the stored bearer
//! credential, renews an expired one through `/auth/refresh` (de-duplicated
//! process-wide) and replays the failed request exactly once. [`ChatApi`]
//! sits on top of it with typed endpoints and implements
//! `insight_core::ChatTransport` for the submission pipeline.

pub mod api;
pub mod credentials;
pub mod gateway;

pub use api::{ChatApi, ChatDetail, ChatMessage, ChatSummary, Feedback};
pub use credentials::{Credential, CredentialStore, Identity};
pub use gateway::{
    AuthGateway, GatewayError, MultipartField, MultipartValue, RequestBody, RequestSpec,
};
