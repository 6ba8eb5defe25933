pub mod attachment_encoder;
pub mod submission_pipeline;

pub use attachment_encoder::{AttachmentError, RejectedAttachment, encode_attachment};
pub use submission_pipeline::{
    DraftInput, SubmissionContext, SubmissionPipeline, SubmitError, ValidationError,
};
