//! Upload validation
//!
//! A file is accepted when its MIME type or its extension is on the allow
//! list (HEIC files often arrive as `application/octet-stream`), and it is no
//! larger than [`MAX_UPLOAD_BYTES`].

use std::path::Path;
use thiserror::Error;

use crate::messages::{self, LocalizedText};

pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

const ALLOWED_MIME_PREFIXES: &[&str] = &["image/", "application/octet-stream"];
const ALLOWED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".heic", ".heif"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Unsupported image format: {name}")]
    UnsupportedFormat { name: String },

    #[error("File {name} is {size} bytes, larger than the {MAX_UPLOAD_BYTES} byte limit")]
    TooLarge { name: String, size: u64 },
}

impl UploadError {
    /// The alert shown to the user
    pub fn message(&self) -> LocalizedText {
        match self {
            UploadError::UnsupportedFormat { .. } => messages::unsupported_format(),
            UploadError::TooLarge { .. } => messages::file_too_large(),
        }
    }
}

/// What validation needs to know about a file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadCandidate {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// A file picked or dropped by the user, with its contents
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Reads a file from disk, guessing the MIME type from its extension
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = mime_for_name(&name).to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    pub fn candidate(&self) -> UploadCandidate {
        UploadCandidate {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.bytes.len() as u64,
        }
    }

    pub fn is_heic(&self) -> bool {
        is_heic_name(&self.name)
    }
}

pub fn validate(candidate: &UploadCandidate) -> Result<(), UploadError> {
    let lower = candidate.name.to_lowercase();
    let has_valid_type = ALLOWED_MIME_PREFIXES
        .iter()
        .any(|prefix| candidate.mime_type.starts_with(prefix));
    let has_valid_extension = ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext));

    if !has_valid_type && !has_valid_extension {
        return Err(UploadError::UnsupportedFormat {
            name: candidate.name.clone(),
        });
    }

    if candidate.size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            name: candidate.name.clone(),
            size: candidate.size,
        });
    }

    Ok(())
}

pub fn is_heic_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".heic") || lower.ends_with(".heif")
}

fn mime_for_name(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    match lower.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "application/octet-stream",
    }
}

/// Human-readable size: `0 Bytes`, `1.5 KB`, `10 MB`
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut exp = 0;
    while exp < UNITS.len() - 1 && bytes >= 1u64 << (10 * (exp + 1)) {
        exp += 1;
    }
    let scaled = bytes as f64 / (1u64 << (10 * exp)) as f64;
    let mut text = format!("{scaled:.2}");
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{} {}", text, UNITS[exp])
}
