//! Chat submission pipeline.
//!
//! Orchestrates one compose-submit cycle: limit gate, prompt validation,
//! per-file attachment validation and concurrent encoding, the optimistic
//! preview, the transport call, and failure classification with retry.
//!
//! Lifecycle: `Idle → Previewing → Submitting → {Succeeded, FailedNetwork,
//! FailedOther}`. A network failure retains the draft so `retry()` can
//! resubmit the identical payload; any other failure discards it.
//!
//! Each attempt owns a cancellation flag. A new `submit()`, a `retry()` or
//! `reset()` flips the previous attempt's flag; a cancelled attempt never
//! writes pipeline state after its next suspension point, so a stale request
//! can never resolve into the wrong conversation's history.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::settings::ChatSettings;
use crate::models::submission::{Draft, SubmissionStatus};
use crate::models::toggles::ToggleState;
use crate::services::attachment_encoder::{self, RejectedAttachment};
use crate::transport::{AskRequest, AskResponse, ChatTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("prompt is {len} characters, maximum is {max}")]
    PromptTooLong { len: usize, max: usize },

    #[error("no attachment passed validation")]
    NoValidAttachments,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("open conversation limit reached ({open}/{max})")]
    LimitExceeded { open: usize, max: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no failed submission to retry")]
    NothingToRetry,

    #[error("submission superseded or cancelled")]
    Cancelled,
}

/// What the user typed: prompt text, selected files, toggle choice.
#[derive(Debug, Clone)]
pub struct DraftInput {
    pub prompt: String,
    pub toggles: ToggleState,
    pub files: Vec<PathBuf>,
}

/// Where the submission is headed.
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    /// Target conversation; `None` opens a new one.
    pub chat_id: Option<String>,
    /// The user's current open-conversation count, checked against the cap
    /// before a new conversation is accepted.
    pub open_conversations: usize,
}

impl SubmissionContext {
    pub fn new_conversation(open_conversations: usize) -> Self {
        Self {
            chat_id: None,
            open_conversations,
        }
    }

    pub fn existing_conversation(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: Some(chat_id.into()),
            open_conversations: 0,
        }
    }
}

struct PipelineState {
    /// Retained only after a network failure; the payload `retry()` resubmits.
    last_draft: Option<Draft>,
    /// Per-file failures from the most recent submission.
    rejections: Vec<RejectedAttachment>,
    /// Cancel flag of the in-flight attempt, if any.
    cancel_flag: Option<Arc<AtomicBool>>,
}

/// The compose-submit state machine.
pub struct SubmissionPipeline {
    transport: Arc<dyn ChatTransport>,
    settings: ChatSettings,
    state: Mutex<PipelineState>,
    status_tx: watch::Sender<SubmissionStatus>,
}

impl SubmissionPipeline {
    pub fn new(transport: Arc<dyn ChatTransport>, settings: ChatSettings) -> Self {
        let (status_tx, _) = watch::channel(SubmissionStatus::Idle);

        Self {
            transport,
            settings,
            state: Mutex::new(PipelineState {
                last_draft: None,
                rejections: Vec::new(),
                cancel_flag: None,
            }),
            status_tx,
        }
    }

    pub fn status(&self) -> SubmissionStatus {
        *self.status_tx.borrow()
    }

    /// Observe status transitions (for the composer UI).
    pub fn subscribe(&self) -> watch::Receiver<SubmissionStatus> {
        self.status_tx.subscribe()
    }

    /// True when a draft is retained from a network failure.
    pub fn can_retry(&self) -> bool {
        self.state.lock().last_draft.is_some()
    }

    /// Per-file rejections from the most recent submission.
    pub fn last_rejections(&self) -> Vec<RejectedAttachment> {
        self.state.lock().rejections.clone()
    }

    /// Cancel any in-flight attempt and return the pipeline to `Idle`.
    ///
    /// Used for teardown (navigating away from the conversation) and to
    /// acknowledge a `Succeeded` submission before the next compose cycle.
    /// The cancelled attempt resolves `SubmitError::Cancelled` and never
    /// writes pipeline state again.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if let Some(flag) = state.cancel_flag.take() {
            flag.store(true, Ordering::SeqCst);
            debug!("Cancelled in-flight submission");
        }
        state.last_draft = None;
        state.rejections.clear();
        drop(state);

        self.status_tx.send_replace(SubmissionStatus::Idle);
    }

    /// Validate, encode and submit a draft.
    ///
    /// Fails fast with `LimitExceeded` on a new conversation at the cap and
    /// with `ValidationError` on a bad prompt or an all-rejected file set;
    /// neither touches the network. On acceptance the draft is previewed
    /// immediately, attachments are encoded concurrently and joined, and the
    /// assembled payload goes out in a single transport call.
    pub async fn submit(
        &self,
        input: DraftInput,
        context: SubmissionContext,
    ) -> Result<AskResponse, SubmitError> {
        // Conversation cap applies only to brand-new conversations and is
        // checked before anything else happens.
        if context.chat_id.is_none() {
            let max = self.settings.max_open_conversations;
            if context.open_conversations >= max {
                warn!(
                    open = context.open_conversations,
                    max, "Rejecting submission: open-conversation limit reached"
                );
                return Err(SubmitError::LimitExceeded {
                    open: context.open_conversations,
                    max,
                });
            }
        }

        if input.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt.into());
        }
        let len = input.prompt.chars().count();
        if len > self.settings.max_prompt_chars {
            return Err(ValidationError::PromptTooLong {
                len,
                max: self.settings.max_prompt_chars,
            }
            .into());
        }

        // Per-file validation. A rejected file never aborts the batch, but
        // if files were supplied and none survived there is nothing to send.
        let mut valid_paths = Vec::new();
        let mut rejections = Vec::new();
        for path in &input.files {
            match attachment_encoder::validate_attachment(path, &self.settings.attachment_limits)
                .await
            {
                Ok(_) => valid_paths.push(path.clone()),
                Err(reason) => {
                    warn!(path = ?path, %reason, "Attachment rejected");
                    rejections.push(RejectedAttachment {
                        path: path.clone(),
                        reason,
                    });
                }
            }
        }
        if !input.files.is_empty() && valid_paths.is_empty() {
            self.state.lock().rejections = rejections;
            return Err(ValidationError::NoValidAttachments.into());
        }

        // Draft accepted: this attempt supersedes any in-flight one, and a
        // new non-retry submission drops any draft retained for retry.
        let flag = {
            let mut state = self.state.lock();
            if let Some(previous) = state.cancel_flag.take() {
                previous.store(true, Ordering::SeqCst);
                debug!("Superseding in-flight submission");
            }
            let flag = Arc::new(AtomicBool::new(false));
            state.cancel_flag = Some(flag.clone());
            state.last_draft = None;
            state.rejections = rejections;
            flag
        };

        // Optimistic preview while attachments encode.
        self.status_tx.send_replace(SubmissionStatus::Previewing);

        let limits = &self.settings.attachment_limits;
        let encoded = join_all(
            valid_paths
                .iter()
                .map(|path| attachment_encoder::encode_attachment(path, limits)),
        )
        .await;

        if flag.load(Ordering::SeqCst) {
            return Err(SubmitError::Cancelled);
        }

        let mut attachments = Vec::new();
        {
            let mut state = self.state.lock();
            for (path, result) in valid_paths.iter().zip(encoded) {
                match result {
                    Ok(attachment) => attachments.push(attachment),
                    // The file disappeared between validation and read.
                    Err(reason) => state.rejections.push(RejectedAttachment {
                        path: path.clone(),
                        reason,
                    }),
                }
            }
        }
        if !input.files.is_empty() && attachments.is_empty() {
            self.finish_attempt(&flag, None, SubmissionStatus::Idle);
            return Err(ValidationError::NoValidAttachments.into());
        }

        let draft = Draft {
            prompt: input.prompt,
            attachments,
            toggles: input.toggles,
            chat_id: context.chat_id,
        };

        self.dispatch(draft, flag, false).await
    }

    /// Resubmit the draft retained by the last network failure.
    ///
    /// The payload is the already-encoded draft, unchanged, so the request
    /// is identical to the one that failed. The failed status stays visible
    /// until this attempt resolves, so the error banner never flickers off
    /// prematurely.
    pub async fn retry(&self) -> Result<AskResponse, SubmitError> {
        let (draft, flag) = {
            let mut state = self.state.lock();
            let draft = state.last_draft.clone().ok_or(SubmitError::NothingToRetry)?;
            if let Some(previous) = state.cancel_flag.take() {
                previous.store(true, Ordering::SeqCst);
            }
            let flag = Arc::new(AtomicBool::new(false));
            state.cancel_flag = Some(flag.clone());
            (draft, flag)
        };

        debug!("Retrying failed submission with retained draft");
        self.dispatch(draft, flag, true).await
    }

    async fn dispatch(
        &self,
        draft: Draft,
        flag: Arc<AtomicBool>,
        is_retry: bool,
    ) -> Result<AskResponse, SubmitError> {
        if !is_retry {
            self.status_tx.send_replace(SubmissionStatus::Submitting);
        }

        let request = AskRequest {
            question: draft.prompt.clone(),
            toggles: draft.toggles,
            chat_id: draft.chat_id.clone(),
            attachments: draft.attachments.clone(),
        };

        let result = self.transport.ask(request).await;

        match result {
            Ok(response) => {
                if !self.finish_attempt(&flag, None, SubmissionStatus::Succeeded) {
                    return Err(SubmitError::Cancelled);
                }
                info!(chat_id = %response.chat_id, "Chat submission succeeded");
                Ok(response)
            }
            Err(TransportError::NetworkUnavailable) => {
                if !self.finish_attempt(&flag, Some(draft), SubmissionStatus::FailedNetwork) {
                    return Err(SubmitError::Cancelled);
                }
                warn!("Chat submission failed: network unavailable, draft retained for retry");
                Err(TransportError::NetworkUnavailable.into())
            }
            Err(err) => {
                if !self.finish_attempt(&flag, None, SubmissionStatus::FailedOther) {
                    return Err(SubmitError::Cancelled);
                }
                warn!(error = %err, "Chat submission failed");
                Err(err.into())
            }
        }
    }

    /// Record the outcome of an attempt, unless it was cancelled in flight.
    ///
    /// Returns false when the attempt was superseded; in that case nothing
    /// is written and the caller reports `Cancelled`.
    fn finish_attempt(
        &self,
        flag: &Arc<AtomicBool>,
        last_draft: Option<Draft>,
        status: SubmissionStatus,
    ) -> bool {
        let mut state = self.state.lock();
        if flag.load(Ordering::SeqCst) {
            return false;
        }
        state.last_draft = last_draft;
        if state
            .cancel_flag
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, flag))
        {
            state.cancel_flag = None;
        }
        drop(state);

        self.status_tx.send_replace(status);
        true
    }
}
