//! Tally Processing Library
//!
//! Pure, I/O-free building blocks for the upload pipeline: candidate-file
//! validation and adaptive image re-encoding.

pub mod encoder;
pub mod validator;

pub use encoder::{encode, should_compress, EncodeOutcome};
pub use validator::{UploadValidator, ValidationError};
