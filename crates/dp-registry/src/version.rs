//! Version records and the append-only arena holding them

use dp_core::{Address, Hash, Tag};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{RegistryError, Result};

/// One published build of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub tag: Tag,
    pub setup_handler: Address,
    pub build_metadata: Vec<u8>,
    /// Release metadata supplied with this build, possibly empty
    pub release_metadata: Vec<u8>,
}

/// Insert-only storage of version records.
///
/// Records are keyed by tag hash and indexed by setup handler. There is no
/// way to replace or remove a record once inserted.
#[derive(Debug, Default)]
pub struct VersionArena {
    records: HashMap<Hash, VersionRecord>,
    by_handler: HashMap<Address, Hash>,
    builds: BTreeMap<u8, u16>,
}

impl VersionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next build of `release`, returning the stored record.
    ///
    /// The build number is assigned here so callers cannot pick one.
    pub fn insert(
        &mut self,
        release: u8,
        setup_handler: Address,
        build_metadata: Vec<u8>,
        release_metadata: Vec<u8>,
    ) -> Result<&VersionRecord> {
        if self.by_handler.contains_key(&setup_handler) {
            return Err(RegistryError::PluginSetupAlreadyInPreviousRelease(setup_handler));
        }

        let build = self
            .build_count(release)
            .checked_add(1)
            .ok_or(RegistryError::BuildLimitReached(release))?;
        let tag = Tag::new(release, build);
        let key = tag.hash();

        self.builds.insert(release, build);
        self.by_handler.insert(setup_handler, key);
        let record = self.records.entry(key).or_insert(VersionRecord {
            tag,
            setup_handler,
            build_metadata,
            release_metadata,
        });
        Ok(record)
    }

    pub fn get(&self, tag_hash: &Hash) -> Option<&VersionRecord> {
        self.records.get(tag_hash)
    }

    pub fn get_tag(&self, tag: &Tag) -> Option<&VersionRecord> {
        self.get(&tag.hash())
    }

    pub fn by_handler(&self, setup_handler: &Address) -> Option<&VersionRecord> {
        self.by_handler
            .get(setup_handler)
            .and_then(|key| self.records.get(key))
    }

    /// Number of builds published in `release`, 0 if none
    pub fn build_count(&self, release: u8) -> u16 {
        self.builds.get(&release).copied().unwrap_or(0)
    }

    /// Highest release with at least one build, 0 when empty
    pub fn latest_release(&self) -> u8 {
        self.builds.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records ordered by tag
    pub fn records(&self) -> Vec<&VersionRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by_key(|r| r.tag);
        records
    }
}
