//! Footprints and block events for the audit journal

use dp_core::{ContentHasher, Hash};
use serde::{Deserialize, Serialize};

/// A notification waiting to be sequenced into the journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub category: String,
    pub action: String,
    pub data: serde_json::Value,
}

impl Footprint {
    pub fn new(
        category: impl Into<String>,
        action: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            category: category.into(),
            action: action.into(),
            data,
        }
    }

    /// Content hash of the footprint payload alone
    pub fn data_hash(&self) -> Hash {
        let data = serde_json::to_vec(&self.data).unwrap_or_default();
        ContentHasher::new("dp.footprint")
            .bytes(self.category.as_bytes())
            .bytes(self.action.as_bytes())
            .bytes(&data)
            .finish()
    }
}

/// A sequenced, hash-chained journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEvent {
    pub sequence: u64,
    pub timestamp_ms: i64,
    pub category: String,
    pub action: String,
    pub data: serde_json::Value,
    pub prev_hash: Hash,
    pub hash: Hash,
}

impl BlockEvent {
    /// Seal a footprint onto the chain after `prev_hash`
    pub fn seal(footprint: Footprint, sequence: u64, prev_hash: Hash) -> Self {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let hash = Self::compute_hash(
            &prev_hash,
            sequence,
            timestamp_ms,
            &footprint.category,
            &footprint.action,
            &footprint.data,
        );

        Self {
            sequence,
            timestamp_ms,
            category: footprint.category,
            action: footprint.action,
            data: footprint.data,
            prev_hash,
            hash,
        }
    }

    fn compute_hash(
        prev_hash: &Hash,
        sequence: u64,
        timestamp_ms: i64,
        category: &str,
        action: &str,
        data: &serde_json::Value,
    ) -> Hash {
        let data = serde_json::to_vec(data).unwrap_or_default();
        ContentHasher::new("dp.block")
            .hash(prev_hash)
            .u64(sequence)
            .u64(timestamp_ms as u64)
            .bytes(category.as_bytes())
            .bytes(action.as_bytes())
            .bytes(&data)
            .finish()
    }

    /// Recompute the hash and compare with the stored one
    pub fn verify(&self) -> bool {
        Self::compute_hash(
            &self.prev_hash,
            self.sequence,
            self.timestamp_ms,
            &self.category,
            &self.action,
            &self.data,
        ) == self.hash
    }
}
