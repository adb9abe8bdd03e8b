use std::path::Path;

use crate::config::UploadConfig;

/// Validation rules applied to a single upload attempt. Built fresh per
/// request from the process-wide configuration so a request never observes a
/// half-updated policy.
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    /// Allowed file extensions, lowercase, without the leading dot.
    /// An empty list means uploads of any type are accepted.
    pub allowed_extensions: Vec<String>,
    /// Maximum file size in bytes.
    pub max_file_size: u64,
}

impl ValidationRules {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            allowed_extensions: config
                .allowed_file_types
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            max_file_size: config.max_file_size,
        }
    }
}

/// Why an upload was rejected before (or while) streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The declared filename's extension is outside the allow-set.
    Extension { extension: Option<String> },
    /// The file is larger than the configured ceiling.
    Size { size: u64, max: u64 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Extension {
                extension: Some(ext),
            } => {
                write!(f, "file extension '.{}' is not allowed", ext)
            }
            Rejection::Extension { extension: None } => {
                write!(f, "files without an extension are not allowed")
            }
            Rejection::Size { size, max } => write!(
                f,
                "file size {} bytes exceeds maximum allowed {} bytes",
                size, max
            ),
        }
    }
}

/// Lowercased extension of a declared filename, if it has one.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Checks the declared filename's extension against the allow-set.
/// Case-insensitive; an empty allow-set accepts everything.
pub fn validate_extension(filename: &str, rules: &ValidationRules) -> Result<(), Rejection> {
    if rules.allowed_extensions.is_empty() {
        return Ok(());
    }

    let extension = file_extension(filename);
    match &extension {
        Some(ext) if rules.allowed_extensions.iter().any(|a| a == ext) => Ok(()),
        _ => Err(Rejection::Extension { extension }),
    }
}

/// Checks a size reported by the transport up front. A stream of unknown
/// length passes here and is bounded incrementally while it is written.
pub fn validate_declared_size(size: Option<u64>, rules: &ValidationRules) -> Result<(), Rejection> {
    match size {
        Some(size) if size > rules.max_file_size => Err(Rejection::Size {
            size,
            max: rules.max_file_size,
        }),
        _ => Ok(()),
    }
}

/// Full metadata validation for an upload attempt. Pure classification:
/// no side effects, nothing is read from the stream.
pub fn validate_upload(
    filename: &str,
    declared_size: Option<u64>,
    rules: &ValidationRules,
) -> Result<(), Rejection> {
    validate_extension(filename, rules)?;
    validate_declared_size(declared_size, rules)?;
    Ok(())
}

/// Validates a pad id taken from the request path. Pad ids become the first
/// segment of storage keys, so path separators and traversal sequences are
/// rejected outright.
pub fn sanitize_pad_id(pad_id: &str) -> Result<&str, String> {
    if pad_id.is_empty() {
        return Err("pad id cannot be empty".to_string());
    }
    if pad_id.contains('/') || pad_id.contains('\\') || pad_id.contains("..") {
        tracing::warn!("Path traversal attempt in pad id: {}", pad_id);
        return Err(format!("invalid pad id '{}'", pad_id));
    }
    if pad_id.chars().any(|c| c.is_control()) {
        return Err("pad id contains control characters".to_string());
    }
    Ok(pad_id)
}
