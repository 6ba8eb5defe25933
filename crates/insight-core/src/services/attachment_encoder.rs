//! Attachment validation and encoding.
//!
//! Validation (size, extension) runs against server-supplied limits before a
//! single byte is read; only a file that passes is read and encoded into a
//! transmittable [`Attachment`].

use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;
use tracing::debug;

use crate::models::settings::AttachmentLimits;
use crate::models::submission::Attachment;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachmentError {
    #[error("file is {size} bytes, maximum is {max}")]
    FileTooLarge { size: u64, max: u64 },

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("file has no extension")]
    NoExtension,

    #[error("file not found")]
    FileNotFound,
}

/// A file that failed validation or could not be read. Surfaced per file;
/// the rest of the batch proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedAttachment {
    pub path: PathBuf,
    pub reason: AttachmentError,
}

/// Check a file against the configured limits without reading it.
///
/// Returns the file size on success so the encoder doesn't stat twice.
pub async fn validate_attachment(
    path: &Path,
    limits: &AttachmentLimits,
) -> Result<u64, AttachmentError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| AttachmentError::FileNotFound)?;

    let size = metadata.len();
    if size > limits.max_size_bytes {
        return Err(AttachmentError::FileTooLarge {
            size,
            max: limits.max_size_bytes,
        });
    }

    let ext = path
        .extension()
        .ok_or(AttachmentError::NoExtension)?
        .to_string_lossy()
        .to_lowercase();

    if !limits.allows_extension(&ext) {
        return Err(AttachmentError::UnsupportedExtension(ext));
    }

    Ok(size)
}

/// Validate and encode one file into a transmittable attachment.
pub async fn encode_attachment(
    path: &Path,
    limits: &AttachmentLimits,
) -> Result<Attachment, AttachmentError> {
    let size_bytes = validate_attachment(path, limits).await?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| AttachmentError::FileNotFound)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    debug!(name = %name, size_bytes, "Encoded attachment");

    Ok(Attachment {
        name,
        mime_type: mime_from_extension(&ext).to_string(),
        size_bytes,
        encoded_payload: base64::engine::general_purpose::STANDARD.encode(&bytes),
    })
}

/// Derive a mime type from the file extension.
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}
