use serde::{Deserialize, Serialize};

/// Server-supplied attachment constraints. Read-only input: the settings
/// collaborator delivers these, this crate only enforces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentLimits {
    pub max_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl AttachmentLimits {
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.allowed_extensions.iter().any(|e| e.to_lowercase() == ext)
    }
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_size_bytes: 5_242_880, // 5MB
            allowed_extensions: ["pdf", "png", "jpg", "jpeg", "gif", "webp", "txt", "md", "csv", "docx", "xlsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Configuration consumed by the submission pipeline. Delivered by the
/// backend's settings endpoint; defaults mirror the backend's own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub max_prompt_chars: usize,
    pub max_open_conversations: usize,
    pub attachment_limits: AttachmentLimits,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_prompt_chars: 4_000,
            max_open_conversations: 20,
            attachment_limits: AttachmentLimits::default(),
        }
    }
}
