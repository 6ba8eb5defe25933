//! Domain core for the Insight chat client.
//!
//! Everything in this crate is transport-agnostic: the submission pipeline
//! talks to the backend through the [`transport::ChatTransport`] seam, and
//! persisted client-side state goes through the
//! [`repositories::KeyValueRepository`] seam. The HTTP implementations of
//! both live in `insight-client`.

pub mod models;
pub mod repositories;
pub mod services;
pub mod transport;

pub use models::settings::{AttachmentLimits, ChatSettings};
pub use models::submission::{Attachment, Draft, SubmissionStatus};
pub use models::toggles::{InsightMode, ToggleController, ToggleScope, ToggleState};
pub use repositories::{
    InMemoryKeyValueRepository, JsonFileKeyValueRepository, KeyValueRepository, RepositoryError,
    RepositoryResult,
};
pub use services::attachment_encoder::{AttachmentError, RejectedAttachment, encode_attachment};
pub use services::submission_pipeline::{
    DraftInput, SubmissionContext, SubmissionPipeline, SubmitError, ValidationError,
};
pub use transport::{AskRequest, AskResponse, ChatTransport, SourceDocument, TransportError};
