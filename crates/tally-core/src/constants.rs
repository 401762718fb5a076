//! Shared constants for upload limits, encoding policy, and reconciliation.

use std::time::Duration;

/// Hard ceiling for a single upload. Files above this are rejected outright.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 25 * 1024 * 1024;

/// Files above this size are routed through the adaptive encoder.
pub const DEFAULT_COMPRESSION_THRESHOLD_BYTES: usize = 5 * 1024 * 1024;

/// Default re-encode quality for the primary encoding pass.
pub const DEFAULT_ENCODE_QUALITY: f32 = 0.8;

/// Quality used for the one-shot re-encode after a 413 from the server.
pub const OVERSIZE_RETRY_QUALITY: f32 = 0.7;

/// Quality used for the one-shot re-encode after a memory-pressure signal.
pub const MEMORY_PRESSURE_QUALITY: f32 = 0.6;

/// Longest edge after adaptive encoding. Images are never upscaled.
pub const DEFAULT_MAX_DIMENSION: u32 = 1920;

/// Retry cap for transient network failures within one upload session.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Exponential backoff base delay between transmit attempts.
pub const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Upper bound on any single backoff delay.
pub const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Per-attempt transmit timeout. Exceeding it is a retriable network failure.
pub const TRANSMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Objects younger than this are never reported as orphans (in-flight grace).
pub const DEFAULT_GRACE_WINDOW_SECS: i64 = 300;

/// Default per-invocation item bound for reconciliation scans.
pub const DEFAULT_MAX_SCAN_ITEMS: usize = 1000;

/// Committed assets live under this key prefix.
pub const ASSET_KEY_PREFIX: &str = "assets/";

/// Key fragments that mark temporary or partial objects during scans.
pub const TEMP_KEY_MARKERS: &[&str] = &["tmp/", ".partial", ".tmp"];

/// Raster formats stored uncompressed at the source; always worth re-encoding.
pub const UNCOMPRESSED_RASTER_TYPES: &[&str] = &["image/png", "image/bmp", "image/tiff"];

/// MIME types the validator accepts.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// File extensions the validator accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];
