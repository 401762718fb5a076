//! Upload session state machine.
//!
//! One session per file. States advance Idle → Validating → Encoding →
//! Transmitting → Committing → Succeeded, with Transmitting → Encoding on a
//! size or memory-pressure signal and any state → Failed on a terminal error.
//! `Failed → Transmitting` happens only through the explicit emergency path.
//!
//! Each recovery strategy fires at most once per session: one re-encode at
//! reduced quality after a 413, one aggressive re-encode after a 503, and a
//! bounded exponential-backoff loop for transient network failures.

use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tally_core::constants::{
    BACKOFF_BASE, BACKOFF_CAP, DEFAULT_COMPRESSION_THRESHOLD_BYTES, DEFAULT_ENCODE_QUALITY,
    DEFAULT_MAX_DIMENSION, DEFAULT_MAX_FILE_SIZE_BYTES, MAX_RETRY_ATTEMPTS,
    MEMORY_PRESSURE_QUALITY, OVERSIZE_RETRY_QUALITY,
};
use tally_core::models::IngestRequest;
use tally_processing::{encode, should_compress, UploadValidator};
use uuid::Uuid;

use crate::transport::{FatalKind, RetryKind, Transport, TransportOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Validating,
    Encoding,
    Transmitting,
    Committing,
    Succeeded,
    Failed,
}

/// The file a session is uploading. Immutable for the session's lifetime.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_file_size: usize,
    pub compression_threshold: usize,
    pub quality: f32,
    pub max_dimension: u32,
    pub max_network_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE_BYTES,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            quality: DEFAULT_ENCODE_QUALITY,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_network_attempts: MAX_RETRY_ATTEMPTS,
            backoff_base: BACKOFF_BASE,
            backoff_cap: BACKOFF_CAP,
        }
    }
}

/// Terminal upload failure with ranked recovery suggestions.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Payload too large even after re-encoding: {0}")]
    TooLarge(String),

    #[error("Server under memory pressure: {0}")]
    MemoryPressure(String),

    #[error("Network failure after {attempts} attempts: {message}")]
    Network { attempts: u32, message: String },

    #[error("Emergency transmit unavailable: {0}")]
    EmergencyUnavailable(String),
}

impl UploadError {
    /// Recovery suggestions, most promising first.
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            UploadError::InvalidFile(_) => vec![
                "Select a supported image format (jpeg, png, gif, webp, bmp, tiff)",
                "Check the file is not empty or truncated",
            ],
            UploadError::Unauthorized(_) => vec!["Check the API token and try again"],
            UploadError::Rejected(_) => vec!["Inspect the server response and correct the request"],
            UploadError::TooLarge(_) => vec![
                "Reduce image dimensions before uploading",
                "Split very large files into smaller uploads",
            ],
            UploadError::MemoryPressure(_) => vec![
                "Wait 30-60 seconds and retry",
                "Retry with a smaller payload",
            ],
            UploadError::Network { .. } => vec![
                "Check connectivity and retry",
                "Use the emergency transmit path if failures persist",
            ],
            UploadError::EmergencyUnavailable(_) => {
                vec!["Emergency transmit requires at least two prior failed attempts"]
            }
        }
    }
}

/// Summary of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub storage_key: String,
    pub asset_id: Uuid,
    pub attempts: u32,
    pub compressed: bool,
    pub original_size: usize,
    pub transmitted_size: usize,
}

struct Payload {
    data: Vec<u8>,
    content_type: String,
    compressed: bool,
}

pub struct UploadSession {
    file: SourceFile,
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    validator: UploadValidator,
    state: SessionState,
    failed_attempts: u32,
    /// Encoded payload held for the session's lifetime; dropped on success.
    payload: Option<Payload>,
}

impl UploadSession {
    pub fn new(file: SourceFile, transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let validator = UploadValidator::with_defaults(config.max_file_size);
        Self {
            file,
            transport,
            config,
            validator,
            state: SessionState::Idle,
            failed_attempts: 0,
            payload: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Failed transmit attempts so far, across `submit` and retries.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Run the full pipeline: validate, encode, then transmit with typed
    /// recovery until success or a terminal failure.
    pub async fn submit(&mut self) -> Result<UploadReport, UploadError> {
        self.state = SessionState::Validating;
        if let Err(e) = self
            .validator
            .validate_all(&self.file.name, &self.file.mime_type, &self.file.data)
        {
            self.state = SessionState::Failed;
            return Err(UploadError::InvalidFile(e.to_string()));
        }

        self.encode_payload(self.config.quality);

        let mut reencoded_oversize = false;
        let mut reencoded_pressure = false;
        let mut network_failures = 0u32;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.transmit().await {
                TransportOutcome::Success(response) => {
                    self.state = SessionState::Committing;
                    if response.storage_key.is_empty() {
                        return Err(self.fail(UploadError::Rejected(
                            "empty storage key in success response".to_string(),
                        )));
                    }
                    let transmitted_size = self
                        .payload
                        .as_ref()
                        .map(|p| p.data.len())
                        .unwrap_or(self.file.data.len());
                    let compressed = self
                        .payload
                        .as_ref()
                        .map(|p| p.compressed)
                        .unwrap_or(false);
                    // Success: drop the locally held encoded buffer.
                    self.payload = None;
                    self.state = SessionState::Succeeded;
                    tracing::info!(
                        storage_key = %response.storage_key,
                        attempts = attempts,
                        "Upload succeeded"
                    );
                    return Ok(UploadReport {
                        storage_key: response.storage_key,
                        asset_id: response.asset_id,
                        attempts,
                        compressed,
                        original_size: self.file.data.len(),
                        transmitted_size,
                    });
                }
                TransportOutcome::Retriable(RetryKind::PayloadTooLarge, message) => {
                    self.failed_attempts += 1;
                    if reencoded_oversize {
                        return Err(self.fail(UploadError::TooLarge(message)));
                    }
                    reencoded_oversize = true;
                    tracing::warn!(
                        quality = OVERSIZE_RETRY_QUALITY,
                        "Payload rejected as too large, re-encoding at reduced quality"
                    );
                    self.encode_payload(OVERSIZE_RETRY_QUALITY);
                }
                TransportOutcome::Retriable(RetryKind::MemoryPressure, message) => {
                    self.failed_attempts += 1;
                    if reencoded_pressure {
                        return Err(self.fail(UploadError::MemoryPressure(message)));
                    }
                    reencoded_pressure = true;
                    tracing::warn!(
                        quality = MEMORY_PRESSURE_QUALITY,
                        "Server under memory pressure, re-encoding aggressively"
                    );
                    self.encode_payload(MEMORY_PRESSURE_QUALITY);
                }
                TransportOutcome::Retriable(RetryKind::Network, message) => {
                    self.failed_attempts += 1;
                    network_failures += 1;
                    if network_failures >= self.config.max_network_attempts {
                        return Err(self.fail(UploadError::Network {
                            attempts: network_failures,
                            message,
                        }));
                    }
                    let delay = self.backoff_delay(network_failures);
                    tracing::warn!(
                        delay_ms = delay.as_millis() as u64,
                        failure = network_failures,
                        error = %message,
                        "Transient network failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                TransportOutcome::Fatal(FatalKind::Unauthorized, message) => {
                    self.failed_attempts += 1;
                    return Err(self.fail(UploadError::Unauthorized(message)));
                }
                TransportOutcome::Fatal(FatalKind::Rejected, message) => {
                    self.failed_attempts += 1;
                    return Err(self.fail(UploadError::Rejected(message)));
                }
            }
        }
    }

    /// Last-resort path: one direct transmit of the raw original bytes, no
    /// encoding, no retry. Only available after at least two failed attempts,
    /// and never entered automatically.
    pub async fn emergency_transmit(&mut self) -> Result<UploadReport, UploadError> {
        if self.failed_attempts < 2 {
            return Err(UploadError::EmergencyUnavailable(format!(
                "only {} failed attempt(s) so far",
                self.failed_attempts
            )));
        }

        tracing::warn!(
            failed_attempts = self.failed_attempts,
            "Emergency transmit: sending raw original bytes"
        );
        self.payload = Some(Payload {
            data: self.file.data.clone(),
            content_type: self.file.mime_type.clone(),
            compressed: false,
        });

        match self.transmit().await {
            TransportOutcome::Success(response) if !response.storage_key.is_empty() => {
                self.payload = None;
                self.state = SessionState::Succeeded;
                Ok(UploadReport {
                    storage_key: response.storage_key,
                    asset_id: response.asset_id,
                    attempts: 1,
                    compressed: false,
                    original_size: self.file.data.len(),
                    transmitted_size: self.file.data.len(),
                })
            }
            TransportOutcome::Success(_) => {
                self.failed_attempts += 1;
                Err(self.fail(UploadError::Rejected(
                    "empty storage key in success response".to_string(),
                )))
            }
            TransportOutcome::Fatal(FatalKind::Unauthorized, message) => {
                self.failed_attempts += 1;
                Err(self.fail(UploadError::Unauthorized(message)))
            }
            TransportOutcome::Fatal(FatalKind::Rejected, message)
            | TransportOutcome::Retriable(_, message) => {
                self.failed_attempts += 1;
                Err(self.fail(UploadError::Rejected(message)))
            }
        }
    }

    /// (Re-)encode the payload from the original bytes at the given quality.
    fn encode_payload(&mut self, quality: f32) {
        self.state = SessionState::Encoding;
        if should_compress(
            self.file.data.len(),
            &self.file.mime_type,
            self.config.compression_threshold,
        ) {
            let outcome = encode(
                &self.file.data,
                &self.file.mime_type,
                quality,
                self.config.max_dimension,
            );
            self.payload = Some(Payload {
                data: outcome.data,
                content_type: outcome.content_type,
                compressed: outcome.compressed,
            });
        } else {
            self.payload = Some(Payload {
                data: self.file.data.clone(),
                content_type: self.file.mime_type.clone(),
                compressed: false,
            });
        }
    }

    async fn transmit(&mut self) -> TransportOutcome {
        self.state = SessionState::Transmitting;
        let (data, content_type) = match self.payload.as_ref() {
            Some(payload) => (&payload.data, payload.content_type.clone()),
            None => (&self.file.data, self.file.mime_type.clone()),
        };
        let request = IngestRequest {
            file_name: self.file.name.clone(),
            file_content: base64::engine::general_purpose::STANDARD.encode(data),
            file_type: content_type,
        };
        self.transport.send(&request).await
    }

    fn fail(&mut self, error: UploadError) -> UploadError {
        self.state = SessionState::Failed;
        tracing::warn!(error = %error, "Upload failed");
        error
    }

    fn backoff_delay(&self, failure: u32) -> Duration {
        let exp = failure.saturating_sub(1).min(16);
        let delay = self.config.backoff_base.saturating_mul(1u32 << exp);
        delay.min(self.config.backoff_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;
    use tally_core::models::{IngestMetadata, IngestResponse};

    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];

    /// Scripted transport: pops one outcome per send, records payload sizes.
    struct FakeTransport {
        script: Mutex<VecDeque<TransportOutcome>>,
        sent_sizes: Mutex<Vec<usize>>,
    }

    impl FakeTransport {
        fn new(script: Vec<TransportOutcome>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                sent_sizes: Mutex::new(Vec::new()),
            })
        }

        fn sends(&self) -> usize {
            self.sent_sizes.lock().unwrap().len()
        }

        fn sent_sizes(&self) -> Vec<usize> {
            self.sent_sizes.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: &IngestRequest) -> TransportOutcome {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(&request.file_content)
                .unwrap();
            self.sent_sizes.lock().unwrap().push(decoded.len());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted send")
        }
    }

    fn success_outcome() -> TransportOutcome {
        TransportOutcome::Success(IngestResponse {
            success: true,
            storage_key: format!("assets/{}.jpg", Uuid::new_v4()),
            asset_id: Uuid::new_v4(),
            metadata: IngestMetadata {
                original_size: 0,
                processed_size: 0,
                processing_time_ms: 1,
                strategy: "direct".to_string(),
            },
            warnings: Vec::new(),
        })
    }

    fn jpeg_file() -> SourceFile {
        SourceFile {
            name: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            data: JPEG_MAGIC.to_vec(),
        }
    }

    // Hash-noise image: incompressible for PNG, so re-encoding shrinks it.
    fn png_file(width: u32, height: u32) -> SourceFile {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            let mut v = x
                .wrapping_mul(0x9E37_79B9)
                .wrapping_add(y.wrapping_mul(0x85EB_CA6B));
            v ^= v >> 15;
            v = v.wrapping_mul(0x2C1B_3C6D);
            v ^= v >> 12;
            image::Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
        });
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        SourceFile {
            name: "photo.png".to_string(),
            mime_type: "image/png".to_string(),
            data: buffer,
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(4),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_successful_upload_reaches_succeeded() {
        let transport = FakeTransport::new(vec![success_outcome()]);
        let mut session = UploadSession::new(jpeg_file(), transport.clone(), fast_config());
        assert_eq!(session.state(), SessionState::Idle);

        let report = session.submit().await.unwrap();
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(report.attempts, 1);
        assert_eq!(transport.sends(), 1);
        // The encoded buffer is dropped on success.
        assert!(session.payload.is_none());
    }

    #[tokio::test]
    async fn test_invalid_file_fails_fast_with_zero_sends() {
        let transport = FakeTransport::new(vec![]);
        let file = SourceFile {
            name: "malware.exe".to_string(),
            mime_type: "image/jpeg".to_string(),
            data: JPEG_MAGIC.to_vec(),
        };
        let mut session = UploadSession::new(file, transport.clone(), fast_config());

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidFile(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.sends(), 0);
        assert!(!err.suggestions().is_empty());
    }

    #[tokio::test]
    async fn test_compressible_file_is_encoded_before_transmit() {
        let transport = FakeTransport::new(vec![success_outcome()]);
        let file = png_file(800, 600);
        let original_size = file.data.len();
        let mut session = UploadSession::new(file, transport.clone(), fast_config());

        let report = session.submit().await.unwrap();
        assert!(report.compressed);
        assert!(report.transmitted_size <= original_size);
        assert_eq!(transport.sent_sizes()[0], report.transmitted_size);
    }

    #[tokio::test]
    async fn test_oversize_rejection_reencodes_once_then_succeeds() {
        let transport = FakeTransport::new(vec![
            TransportOutcome::Retriable(RetryKind::PayloadTooLarge, "413".to_string()),
            success_outcome(),
        ]);
        let mut session = UploadSession::new(png_file(800, 600), transport.clone(), fast_config());

        let report = session.submit().await.unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(transport.sends(), 2);
        let sizes = transport.sent_sizes();
        // Lower quality: the second payload is no larger than the first.
        assert!(sizes[1] <= sizes[0]);
    }

    #[tokio::test]
    async fn test_second_oversize_rejection_is_terminal() {
        let transport = FakeTransport::new(vec![
            TransportOutcome::Retriable(RetryKind::PayloadTooLarge, "413".to_string()),
            TransportOutcome::Retriable(RetryKind::PayloadTooLarge, "413".to_string()),
        ]);
        let mut session = UploadSession::new(png_file(800, 600), transport.clone(), fast_config());

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, UploadError::TooLarge(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.sends(), 2);
    }

    #[tokio::test]
    async fn test_memory_pressure_triggers_aggressive_reencode() {
        let transport = FakeTransport::new(vec![
            TransportOutcome::Retriable(RetryKind::MemoryPressure, "503".to_string()),
            success_outcome(),
        ]);
        let mut session = UploadSession::new(png_file(800, 600), transport.clone(), fast_config());

        let report = session.submit().await.unwrap();
        assert_eq!(report.attempts, 2);
        let sizes = transport.sent_sizes();
        assert!(sizes[1] <= sizes[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failures_back_off_then_succeed() {
        let transport = FakeTransport::new(vec![
            TransportOutcome::Retriable(RetryKind::Network, "reset".to_string()),
            TransportOutcome::Retriable(RetryKind::Network, "reset".to_string()),
            success_outcome(),
        ]);
        let mut session =
            UploadSession::new(jpeg_file(), transport.clone(), SessionConfig::default());

        let report = session.submit().await.unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(transport.sends(), 3);
        assert_eq!(session.state(), SessionState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failures_exhaust_attempts() {
        let transport = FakeTransport::new(vec![
            TransportOutcome::Retriable(RetryKind::Network, "reset".to_string()),
            TransportOutcome::Retriable(RetryKind::Network, "reset".to_string()),
            TransportOutcome::Retriable(RetryKind::Network, "reset".to_string()),
        ]);
        let mut session =
            UploadSession::new(jpeg_file(), transport.clone(), SessionConfig::default());

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, UploadError::Network { attempts: 3, .. }));
        assert_eq!(transport.sends(), 3);
        assert_eq!(session.failed_attempts(), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal_with_one_send() {
        let transport = FakeTransport::new(vec![TransportOutcome::Fatal(
            FatalKind::Unauthorized,
            "bad token".to_string(),
        )]);
        let mut session = UploadSession::new(jpeg_file(), transport.clone(), fast_config());

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, UploadError::Unauthorized(_)));
        assert_eq!(transport.sends(), 1);
    }

    #[tokio::test]
    async fn test_empty_storage_key_is_rejected() {
        let mut response = match success_outcome() {
            TransportOutcome::Success(r) => r,
            _ => unreachable!(),
        };
        response.storage_key = String::new();
        let transport = FakeTransport::new(vec![TransportOutcome::Success(response)]);
        let mut session = UploadSession::new(jpeg_file(), transport, fast_config());

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, UploadError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_emergency_transmit_gated_on_prior_failures() {
        let transport = FakeTransport::new(vec![]);
        let mut session = UploadSession::new(jpeg_file(), transport.clone(), fast_config());

        let err = session.emergency_transmit().await.unwrap_err();
        assert!(matches!(err, UploadError::EmergencyUnavailable(_)));
        assert_eq!(transport.sends(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_transmit_sends_raw_bytes_after_failures() {
        let file = png_file(800, 600);
        let original_size = file.data.len();
        let transport = FakeTransport::new(vec![
            TransportOutcome::Retriable(RetryKind::Network, "reset".to_string()),
            TransportOutcome::Retriable(RetryKind::Network, "reset".to_string()),
            TransportOutcome::Retriable(RetryKind::Network, "reset".to_string()),
            success_outcome(),
        ]);
        let mut session = UploadSession::new(file, transport.clone(), SessionConfig::default());

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, UploadError::Network { .. }));
        assert!(session.failed_attempts() >= 2);

        let report = session.emergency_transmit().await.unwrap();
        assert_eq!(session.state(), SessionState::Succeeded);
        assert!(!report.compressed);
        // Raw original bytes, not the encoded payload.
        assert_eq!(*transport.sent_sizes().last().unwrap(), original_size);
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let session = UploadSession::new(
            jpeg_file(),
            FakeTransport::new(vec![]),
            SessionConfig::default(),
        );
        assert_eq!(session.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(session.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(session.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(session.backoff_delay(4), Duration::from_secs(10));
        assert_eq!(session.backoff_delay(10), Duration::from_secs(10));
    }
}
