use crate::models::Role;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Dashboard snapshots are cached per (organization, role) as serialized
/// JSON. Entries carry a SHA-256 checksum so a corrupted or tampered cache
/// entry is detected on read and refetched instead of served.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DashboardSnapshot {
    /// Serialized dashboard view JSON.
    pub payload: String,
    /// When the aggregates behind this snapshot were read.
    pub generated_at: DateTime<Utc>,
    checksum: String,
}

impl DashboardSnapshot {
    /// Seals a payload with its checksum and generation timestamp.
    pub fn seal(payload: String) -> Self {
        let checksum = digest(&payload);
        Self {
            payload,
            generated_at: Utc::now(),
            checksum,
        }
    }

    /// True when the payload still matches its recorded checksum.
    pub fn is_intact(&self) -> bool {
        digest(&self.payload) == self.checksum
    }

    /// Serialized form for storage in the cache.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decodes a cached entry, returning `None` for corrupt or invalid
    /// entries so the caller falls back to a fresh fetch.
    pub fn decode_valid(encoded: &str) -> Option<DashboardSnapshot> {
        let snapshot: DashboardSnapshot = serde_json::from_str(encoded).ok()?;
        if snapshot.is_intact() {
            Some(snapshot)
        } else {
            tracing::warn!(
                "Dashboard snapshot failed integrity check (payload length {})",
                snapshot.payload.len()
            );
            None
        }
    }
}

fn digest(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache key for one organization's view of one role.
pub fn snapshot_key(org_id: Uuid, role: Role) -> String {
    format!("{}:{}", org_id, role)
}
