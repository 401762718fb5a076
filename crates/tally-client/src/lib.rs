//! Tally Client Library
//!
//! Client-side upload pipeline: an explicit `UploadSession` state machine
//! (validate, encode, transmit, commit) with typed recovery over a `Transport`
//! seam, plus the reqwest-backed `HttpTransport`.

pub mod session;
pub mod transport;

pub use session::{
    SessionConfig, SessionState, SourceFile, UploadError, UploadReport, UploadSession,
};
pub use transport::{FatalKind, HttpTransport, RetryKind, Transport, TransportOutcome};
