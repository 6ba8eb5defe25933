use base64::Engine;
use serde::{Deserialize, Serialize};

use super::toggles::ToggleState;

/// An encoded, validated file ready for submission. Produced only by the
/// attachment encoder; a file that fails validation never becomes one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Base64-encoded file contents.
    pub encoded_payload: String,
}

impl Attachment {
    /// Decode the payload back into raw bytes for transmission.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.encoded_payload)
    }
}

/// The in-progress chat message: prompt, encoded attachments, toggle
/// selection and the conversation it targets (none for a new conversation).
///
/// Owned by the pipeline for one compose-submit cycle. A draft retained
/// after a network failure is resubmitted verbatim by `retry()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub prompt: String,
    pub attachments: Vec<Attachment>,
    pub toggles: ToggleState,
    pub chat_id: Option<String>,
}

/// Lifecycle of one compose-submit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Idle,
    /// Draft accepted and rendered optimistically; encoding may still run.
    Previewing,
    Submitting,
    Succeeded,
    /// No response reached the server; the draft is retained for retry.
    FailedNetwork,
    /// Terminal failure; the draft is discarded.
    FailedOther,
}
