//! Tally Storage Library
//!
//! Object-store abstraction and implementations. The store is key-addressed
//! binary storage with no query capability beyond list-by-prefix; no ownership
//! metadata lives here.
//!
//! # Storage key format
//!
//! Committed assets live under `assets/{uuid}.{ext}` where the extension is
//! sanitized from the original filename. Keys must not contain `..` or a
//! leading `/`. Key generation is centralized in the `keys` module.

pub mod keys;
pub mod local;
pub mod memory;
pub mod traits;

pub use keys::{generate_asset_key, sanitize_extension};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use traits::{ObjectStore, StoreError, StoreResult};
