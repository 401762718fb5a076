//! Asset record and stored object models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What an asset record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwnerKind {
    StandaloneAsset,
    EntityAvatar,
    EntityGalleryItem,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::StandaloneAsset => "standalone-asset",
            OwnerKind::EntityAvatar => "entity-avatar",
            OwnerKind::EntityGalleryItem => "entity-gallery-item",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standalone-asset" => Ok(OwnerKind::StandaloneAsset),
            "entity-avatar" => Ok(OwnerKind::EntityAvatar),
            "entity-gallery-item" => Ok(OwnerKind::EntityGalleryItem),
            other => Err(format!("unknown owner kind: {}", other)),
        }
    }
}

/// Metadata record for a committed asset.
///
/// The record is the source of truth for "this object is in use": a committed
/// record's `storage_key` referenced an object that existed at commit time,
/// and the key is immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: Uuid,
    pub owner_kind: OwnerKind,
    pub owner_id: Option<Uuid>,
    pub storage_key: String,
    pub byte_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A key in the object store. The store holds dumb bytes plus a key; no
/// ownership metadata lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub byte_size: u64,
    pub last_modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_kind_round_trip() {
        for kind in [
            OwnerKind::StandaloneAsset,
            OwnerKind::EntityAvatar,
            OwnerKind::EntityGalleryItem,
        ] {
            assert_eq!(kind.as_str().parse::<OwnerKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_owner_kind_rejects_unknown() {
        assert!("partner-logo".parse::<OwnerKind>().is_err());
    }

    #[test]
    fn test_owner_kind_serde_kebab_case() {
        let json = serde_json::to_string(&OwnerKind::EntityGalleryItem).unwrap();
        assert_eq!(json, "\"entity-gallery-item\"");
    }
}
