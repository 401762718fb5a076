//! Collision-resistant storage key generation.
//!
//! Key format: `assets/{uuid}.{ext}`. A fresh UUID per attempt means retries
//! after a partial failure never collide with the orphan left behind.

use crate::traits::{StoreError, StoreResult};
use tally_core::constants::ASSET_KEY_PREFIX;
use uuid::Uuid;

/// Extract and sanitize the extension from an untrusted filename.
///
/// Keeps only ASCII alphanumerics, lowercased, capped at 8 characters.
/// Filenames without a usable extension get "bin".
pub fn sanitize_extension(file_name: &str) -> String {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let cleaned: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_lowercase();

    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned
    }
}

/// Generate a fresh storage key for an asset.
pub fn generate_asset_key(file_name: &str) -> String {
    format!(
        "{}{}.{}",
        ASSET_KEY_PREFIX,
        Uuid::new_v4(),
        sanitize_extension(file_name)
    )
}

/// Reject keys that could escape the store root.
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') {
        return Err(StoreError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
