//! Content-addressed setup identifiers
//!
//! Ids are pure functions of their inputs. A prepared id commits to the
//! installation, the version, the permission diff, the helpers and, for
//! update and uninstall, the applied setup it chains from.

use dp_core::{Address, ContentHasher, Hash, PluginSetupRef};
use serde::{Deserialize, Serialize};

/// Which transition a prepared setup proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreparationType {
    Installation,
    Update,
    Uninstallation,
}

impl PreparationType {
    fn code(self) -> u8 {
        match self {
            PreparationType::Installation => 1,
            PreparationType::Update => 2,
            PreparationType::Uninstallation => 3,
        }
    }
}

/// Identity of a plugin within a DAO
pub fn installation_id(dao: Address, plugin: Address) -> Hash {
    ContentHasher::new("dp.installation")
        .address(&dao)
        .address(&plugin)
        .finish()
}

/// Inputs of a prepared setup id
#[derive(Debug, Clone, Copy)]
pub struct PreparedSetupFields<'a> {
    pub installation_id: Hash,
    pub setup_ref: PluginSetupRef,
    pub permissions_hash: Hash,
    pub helpers_hash: Hash,
    pub init_data: &'a [u8],
    pub preparation: PreparationType,
    /// Applied setup the proposal chains from; `None` for installations
    pub current_applied_setup_id: Option<Hash>,
}

pub fn prepared_setup_id(fields: &PreparedSetupFields<'_>) -> Hash {
    ContentHasher::new("dp.prepared-setup")
        .hash(&fields.installation_id)
        .tag(&fields.setup_ref.version_tag)
        .address(&fields.setup_ref.repo)
        .hash(&fields.permissions_hash)
        .hash(&fields.helpers_hash)
        .bytes(fields.init_data)
        .u8(fields.preparation.code())
        .optional_hash(fields.current_applied_setup_id.as_ref())
        .finish()
}

pub fn applied_setup_id(dao: Address, plugin: Address, prepared_setup_id: Hash) -> Hash {
    ContentHasher::new("dp.applied-setup")
        .address(&dao)
        .address(&plugin)
        .hash(&prepared_setup_id)
        .finish()
}
