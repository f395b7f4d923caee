//! Append-only, hash-chained journal
//!
//! Every footprint is sealed into a [`BlockEvent`] whose hash covers the
//! previous block's hash, so rewriting any past entry breaks the chain.
//! Blocks optionally land on disk as `block-{sequence:012}.json`.

use dp_core::{Error, Hash, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::event::{BlockEvent, Footprint};
use crate::retention::RetentionPolicy;

struct JournalState {
    /// Sequence number of the last sealed block (0 = empty)
    sequence: u64,
    head: Hash,
    window: VecDeque<BlockEvent>,
}

/// Append-only audit journal
pub struct Journal {
    state: RwLock<JournalState>,
    retention: RetentionPolicy,
    persist_dir: Option<PathBuf>,
}

impl Journal {
    /// Create a journal that only keeps its retention window in memory
    pub fn in_memory(retention: RetentionPolicy) -> Self {
        Self {
            state: RwLock::new(JournalState {
                sequence: 0,
                head: Hash::ZERO,
                window: VecDeque::new(),
            }),
            retention,
            persist_dir: None,
        }
    }

    /// Create a journal persisted under `dir`, resuming from the last block on disk
    pub async fn persistent(dir: impl AsRef<Path>, retention: RetentionPolicy) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut journal = Self::in_memory(retention);
        if let Some(last) = Self::load_last_block(&dir).await? {
            if !last.verify() {
                return Err(Error::integrity(format!(
                    "block {} in {:?} fails hash verification",
                    last.sequence, dir
                )));
            }
            info!(
                "Resuming journal at {:?} from block {} ({})",
                dir,
                last.sequence,
                last.hash.short()
            );
            let state = journal.state.get_mut();
            state.sequence = last.sequence;
            state.head = last.hash;
            state.window.push_back(last);
        } else {
            info!("Journal initialized at {:?}", dir);
        }
        journal.persist_dir = Some(dir);
        Ok(journal)
    }

    fn block_file_name(sequence: u64) -> String {
        format!("block-{:012}.json", sequence)
    }

    /// Blocks are written under a `.tmp` name and renamed into place
    async fn write_block(dir: &Path, event: &BlockEvent) -> Result<()> {
        let name = Self::block_file_name(event.sequence);
        let tmp = dir.join(format!("{}.tmp", name));
        let data = serde_json::to_string_pretty(event)?;
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, dir.join(name)).await?;
        Ok(())
    }

    async fn load_last_block(dir: &Path) -> Result<Option<BlockEvent>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut last: Option<String> = None;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !(name.starts_with("block-") && name.ends_with(".json")) {
                continue;
            }
            // Zero-padded names sort by sequence
            if last.as_ref().map_or(true, |current| name > *current) {
                last = Some(name);
            }
        }

        match last {
            Some(name) => {
                let data = tokio::fs::read_to_string(dir.join(&name)).await?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    /// Seal a footprint onto the chain and return the resulting block
    pub async fn append(&self, footprint: Footprint) -> Result<BlockEvent> {
        let mut state = self.state.write().await;
        let sequence = state.sequence + 1;
        let event = BlockEvent::seal(footprint, sequence, state.head);

        if let Some(ref dir) = self.persist_dir {
            Self::write_block(dir, &event).await?;
        }

        state.sequence = sequence;
        state.head = event.hash;
        state.window.push_back(event.clone());

        let overflow = self.retention.overflow(state.window.len());
        state.window.drain(..overflow);

        debug!(
            sequence,
            category = %event.category,
            action = %event.action,
            hash = %event.hash.short(),
            "Appended journal block"
        );
        Ok(event)
    }

    /// Hash of the latest block (zero when empty)
    pub async fn head(&self) -> Hash {
        self.state.read().await.head
    }

    /// Total number of blocks ever appended
    pub async fn len(&self) -> u64 {
        self.state.read().await.sequence
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Events currently held in memory, oldest first
    pub async fn events(&self) -> Vec<BlockEvent> {
        self.state.read().await.window.iter().cloned().collect()
    }

    /// In-memory events filtered by category
    pub async fn events_in(&self, category: &str) -> Vec<BlockEvent> {
        self.state
            .read()
            .await
            .window
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    /// Verify every block in the window and the links between them
    pub async fn verify_chain(&self) -> Result<()> {
        let state = self.state.read().await;
        let mut expected_prev: Option<Hash> = None;

        for event in &state.window {
            if !event.verify() {
                return Err(Error::integrity(format!(
                    "block {} hash mismatch",
                    event.sequence
                )));
            }
            if let Some(prev) = expected_prev {
                if event.prev_hash != prev {
                    return Err(Error::integrity(format!(
                        "block {} does not link to block {}",
                        event.sequence,
                        event.sequence - 1
                    )));
                }
            }
            expected_prev = Some(event.hash);
        }
        Ok(())
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::in_memory(RetentionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_chains_blocks() {
        let journal = Journal::in_memory(RetentionPolicy::unbounded());
        let first = journal
            .append(Footprint::new("registry", "version_created", json!({"build": 1})))
            .await
            .unwrap();
        let second = journal
            .append(Footprint::new("registry", "version_created", json!({"build": 2})))
            .await
            .unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(first.prev_hash, Hash::ZERO);
        assert_eq!(second.prev_hash, first.hash);
        assert_eq!(journal.head().await, second.hash);
        assert!(journal.verify_chain().await.is_ok());
    }

    #[tokio::test]
    async fn test_retention_bounds_window_not_sequence() {
        let journal = Journal::in_memory(RetentionPolicy::minimal());
        for i in 0..10 {
            journal
                .append(Footprint::new("processor", "tick", json!({ "i": i })))
                .await
                .unwrap();
        }

        let events = journal.events().await;
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].sequence, 7);
        assert_eq!(journal.len().await, 10);
        assert!(journal.verify_chain().await.is_ok());
    }

    #[tokio::test]
    async fn test_events_in_filters_category() {
        let journal = Journal::default();
        journal
            .append(Footprint::new("registry", "version_created", json!({})))
            .await
            .unwrap();
        journal
            .append(Footprint::new("processor", "installation_prepared", json!({})))
            .await
            .unwrap();

        let processor = journal.events_in("processor").await;
        assert_eq!(processor.len(), 1);
        assert_eq!(processor[0].action, "installation_prepared");
    }

    #[tokio::test]
    async fn test_persistent_journal_resumes_head() {
        let dir = tempfile::tempdir().unwrap();

        let head = {
            let journal = Journal::persistent(dir.path(), RetentionPolicy::default())
                .await
                .unwrap();
            journal
                .append(Footprint::new("registry", "version_created", json!({"build": 1})))
                .await
                .unwrap();
            journal
                .append(Footprint::new("registry", "version_created", json!({"build": 2})))
                .await
                .unwrap()
                .hash
        };

        assert!(dir.path().join("block-000000000002.json").exists());

        let resumed = Journal::persistent(dir.path(), RetentionPolicy::default())
            .await
            .unwrap();
        assert_eq!(resumed.head().await, head);
        assert_eq!(resumed.len().await, 2);

        let third = resumed
            .append(Footprint::new("registry", "version_created", json!({"build": 3})))
            .await
            .unwrap();
        assert_eq!(third.sequence, 3);
        assert_eq!(third.prev_hash, head);
        assert!(resumed.verify_chain().await.is_ok());
    }

    #[tokio::test]
    async fn test_torn_scratch_block_is_ignored_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let head = {
            let journal = Journal::persistent(dir.path(), RetentionPolicy::default())
                .await
                .unwrap();
            journal
                .append(Footprint::new("processor", "installation_applied", json!({})))
                .await
                .unwrap()
                .hash
        };
        assert!(!dir.path().join("block-000000000001.json.tmp").exists());

        std::fs::write(dir.path().join("block-000000000002.json.tmp"), "{\"sequence\": 2, \"hash").unwrap();

        let resumed = Journal::persistent(dir.path(), RetentionPolicy::default())
            .await
            .unwrap();
        assert_eq!(resumed.len().await, 1);
        assert_eq!(resumed.head().await, head);

        let next = resumed
            .append(Footprint::new("processor", "update_prepared", json!({})))
            .await
            .unwrap();
        assert_eq!(next.sequence, 2);
        assert!(dir.path().join("block-000000000002.json").exists());
        assert!(!dir.path().join("block-000000000002.json.tmp").exists());
    }
}
