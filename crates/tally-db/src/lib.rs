//! Tally Database Library
//!
//! Metadata-store access. The `AssetCatalog` trait is the seam between
//! services and the relational store; `PgAssetCatalog` is the Postgres
//! implementation.

mod catalog;
mod pg;

pub use catalog::{AssetCatalog, NewAssetRecord};
pub use pg::PgAssetCatalog;
