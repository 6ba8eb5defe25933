pub mod settings;
pub mod submission;
pub mod toggles;

pub use settings::{AttachmentLimits, ChatSettings};
pub use submission::{Attachment, Draft, SubmissionStatus};
pub use toggles::{InsightMode, ToggleController, ToggleScope, ToggleState};
