//! Stored-record envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record as persisted: storage-assigned identity and timestamps around the
/// client-supplied fields.
///
/// Serializes flat, so a stored risk reads as
/// `{"id": 1, "title": "...", ..., "created_at": "...", "updated_at": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity<R> {
    pub id: i64,
    #[serde(flatten)]
    pub record: R,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// File attached to an evidence record. Written by the server only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Opaque reference understood by the blob store (`file://...`).
    pub blob_ref: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    /// Hex-encoded SHA-256 of the content.
    pub sha256: String,
}
