//! Setup handler interface and prepared setup data

use anyhow::Result;
use async_trait::async_trait;
use dp_core::{Address, ContentHasher, Hash, Tag};
use dp_permissions::{hash_permissions, MultiTargetPermission};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::plugin::BoxedPlugin;

/// Output of a setup handler: helpers the plugin depends on and the
/// permission diff to apply on the DAO
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedSetupData {
    pub helpers: Vec<Address>,
    pub permissions: Vec<MultiTargetPermission>,
}

impl PreparedSetupData {
    pub fn new(helpers: Vec<Address>, permissions: Vec<MultiTargetPermission>) -> Self {
        Self {
            helpers,
            permissions,
        }
    }

    pub fn helpers_hash(&self) -> Hash {
        hash_helpers(&self.helpers)
    }

    pub fn permissions_hash(&self) -> Hash {
        hash_permissions(&self.permissions)
    }
}

/// Canonical content hash of an ordered helper list
pub fn hash_helpers(helpers: &[Address]) -> Hash {
    helpers
        .iter()
        .fold(
            ContentHasher::new("dp.helpers").u64(helpers.len() as u64),
            |hasher, helper| hasher.address(helper),
        )
        .finish()
}

/// A freshly deployed, not yet initialized plugin plus its setup data
pub struct PreparedInstallation {
    pub plugin: BoxedPlugin,
    pub prepared_setup_data: PreparedSetupData,
}

impl fmt::Debug for PreparedInstallation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedInstallation")
            .field("plugin", &self.plugin.address())
            .field("prepared_setup_data", &self.prepared_setup_data)
            .finish()
    }
}

/// Result of preparing an update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedUpdate {
    /// Data passed to the plugin's upgrade hook
    pub init_data: Vec<u8>,
    pub prepared_setup_data: PreparedSetupData,
}

/// Context handed to a setup handler for update and uninstall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupPayload {
    pub plugin: Address,
    /// Helpers recorded for the currently applied setup
    pub current_helpers: Vec<Address>,
    /// Handler-specific payload
    pub data: Vec<u8>,
}

impl SetupPayload {
    pub fn new(plugin: Address, current_helpers: Vec<Address>, data: Vec<u8>) -> Self {
        Self {
            plugin,
            current_helpers,
            data,
        }
    }
}

/// Knows how to prepare install, update and uninstall data for one plugin
/// version.
///
/// Implementations must be deterministic: the same inputs yield the same
/// plugin address and the same setup data.
#[async_trait]
pub trait SetupHandler: Send + Sync {
    /// Address this handler is published under
    fn address(&self) -> Address;

    /// Logic that plugins prepared by this handler run
    fn implementation(&self) -> Address;

    /// Whether a plugin installed at `from` may be updated to `to`.
    ///
    /// Asked of the handler of the target version. The default allows
    /// moving forward within a release.
    fn supports_update(&self, from: Tag, to: Tag) -> bool {
        from.release == to.release && from.build < to.build
    }

    /// Deploy a new plugin for `dao` and describe its setup
    async fn prepare_installation(&self, dao: Address, data: &[u8]) -> Result<PreparedInstallation>;

    /// Describe the update of an installed plugin from build `current_build`
    async fn prepare_update(
        &self,
        _dao: Address,
        _current_build: u16,
        payload: &SetupPayload,
    ) -> Result<PreparedUpdate> {
        Ok(PreparedUpdate {
            init_data: Vec::new(),
            prepared_setup_data: PreparedSetupData::new(payload.current_helpers.clone(), Vec::new()),
        })
    }

    /// Describe the permissions to revoke when the plugin is removed
    async fn prepare_uninstallation(
        &self,
        dao: Address,
        payload: &SetupPayload,
    ) -> Result<Vec<MultiTargetPermission>>;
}

/// Handler shared between the registry and in-flight prepare calls
pub type SharedSetupHandler = Arc<dyn SetupHandler>;
