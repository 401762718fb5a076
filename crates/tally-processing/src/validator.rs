//! Candidate-file validation. Pure checks, no I/O.

use std::path::Path;
use tally_core::constants::{ALLOWED_CONTENT_TYPES, ALLOWED_EXTENSIONS};

/// Validation errors for candidate upload files
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File signature does not match declared type {declared} (detected: {detected})")]
    SignatureMismatch { declared: String, detected: String },

    #[error("Empty file")]
    EmptyFile,
}

/// Sniff a content type from magic bytes. Returns None for unrecognized data.
fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        Some("image/tiff")
    } else {
        None
    }
}

/// Upload file validator
///
/// Pure checks on a candidate file: size ceiling, declared type, extension,
/// and magic-byte sanity. No storage or network coupling.
pub struct UploadValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl UploadValidator {
    pub fn new(
        max_file_size: usize,
        allowed_extensions: Vec<String>,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            max_file_size,
            allowed_extensions,
            allowed_content_types,
        }
    }

    /// Validator with the default image allow-lists and the given ceiling.
    pub fn with_defaults(max_file_size: usize) -> Self {
        Self::new(
            max_file_size,
            ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate file extension
    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(())
    }

    /// Validate declared content type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.to_lowercase();

        if !self
            .allowed_content_types
            .iter()
            .any(|ct| ct == &normalized)
        {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate that the file's magic bytes agree with the declared type.
    /// Prevents content-type spoofing; unrecognized signatures are allowed
    /// through (the individual checks still apply).
    pub fn validate_signature(
        &self,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let Some(detected) = sniff_content_type(data) else {
            tracing::debug!(
                content_type = %content_type,
                "Unrecognized file signature, skipping signature cross-check"
            );
            return Ok(());
        };

        if detected != content_type.to_lowercase() {
            return Err(ValidationError::SignatureMismatch {
                declared: content_type.to_string(),
                detected: detected.to_string(),
            });
        }

        Ok(())
    }

    /// Validate all aspects of a candidate file.
    pub fn validate_all(
        &self,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<(), ValidationError> {
        self.validate_file_size(data.len())?;
        self.validate_extension(filename)?;
        self.validate_content_type(content_type)?;
        self.validate_signature(data, content_type)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0];

    fn test_validator() -> UploadValidator {
        UploadValidator::with_defaults(1024 * 1024)
    }

    #[test]
    fn test_validate_file_size_ok() {
        assert!(test_validator().validate_file_size(512 * 1024).is_ok());
    }

    #[test]
    fn test_validate_file_size_too_large() {
        assert!(matches!(
            test_validator().validate_file_size(2 * 1024 * 1024),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_file_size_empty() {
        assert!(matches!(
            test_validator().validate_file_size(0),
            Err(ValidationError::EmptyFile)
        ));
    }

    #[test]
    fn test_validate_extension_case_insensitive() {
        let validator = test_validator();
        assert!(validator.validate_extension("test.jpg").is_ok());
        assert!(validator.validate_extension("test.PNG").is_ok());
        assert!(validator.validate_extension("test.exe").is_err());
        assert!(validator.validate_extension("noextension").is_err());
    }

    #[test]
    fn test_validate_content_type() {
        let validator = test_validator();
        assert!(validator.validate_content_type("image/jpeg").is_ok());
        assert!(validator.validate_content_type("IMAGE/PNG").is_ok());
        assert!(validator.validate_content_type("application/pdf").is_err());
    }

    #[test]
    fn test_validate_signature_match() {
        let validator = test_validator();
        assert!(validator.validate_signature(PNG_MAGIC, "image/png").is_ok());
        assert!(validator
            .validate_signature(JPEG_MAGIC, "image/jpeg")
            .is_ok());
    }

    #[test]
    fn test_validate_signature_spoofed_type() {
        let validator = test_validator();
        assert!(matches!(
            validator.validate_signature(PNG_MAGIC, "image/jpeg"),
            Err(ValidationError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_signature_unknown_passes() {
        let validator = test_validator();
        assert!(validator
            .validate_signature(b"unrecognized bytes", "image/jpeg")
            .is_ok());
    }

    #[test]
    fn test_validate_all() {
        let validator = test_validator();
        assert!(validator
            .validate_all("photo.png", "image/png", PNG_MAGIC)
            .is_ok());
        assert!(validator
            .validate_all("photo.png", "image/png", &[])
            .is_err());
        assert!(validator
            .validate_all("photo.exe", "image/png", PNG_MAGIC)
            .is_err());
    }
}
