//! Parameters and results of the six setup transitions

use dp_core::{Address, Hash, PluginSetupRef, Tag};
use dp_permissions::MultiTargetPermission;
use dp_plugin::{PreparedSetupData, SetupPayload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareInstallationParams {
    pub setup_ref: PluginSetupRef,
    /// Handler-specific installation payload
    pub data: Vec<u8>,
}

/// What a caller needs to review and later apply an installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationProposal {
    pub plugin: Address,
    pub prepared_setup_data: PreparedSetupData,
    pub prepared_setup_id: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyInstallationParams {
    pub setup_ref: PluginSetupRef,
    pub plugin: Address,
    pub permissions: Vec<MultiTargetPermission>,
    pub helpers_hash: Hash,
}

impl ApplyInstallationParams {
    /// Apply parameters matching a proposal as prepared
    pub fn from_proposal(setup_ref: PluginSetupRef, proposal: &InstallationProposal) -> Self {
        Self {
            setup_ref,
            plugin: proposal.plugin,
            permissions: proposal.prepared_setup_data.permissions.clone(),
            helpers_hash: proposal.prepared_setup_data.helpers_hash(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareUpdateParams {
    pub current_version_tag: Tag,
    pub new_version_tag: Tag,
    pub repo: Address,
    pub setup_payload: SetupPayload,
}

impl PrepareUpdateParams {
    pub fn current_setup_ref(&self) -> PluginSetupRef {
        PluginSetupRef::new(self.current_version_tag, self.repo)
    }

    pub fn new_setup_ref(&self) -> PluginSetupRef {
        PluginSetupRef::new(self.new_version_tag, self.repo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateProposal {
    pub init_data: Vec<u8>,
    pub prepared_setup_data: PreparedSetupData,
    pub prepared_setup_id: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyUpdateParams {
    pub plugin: Address,
    /// Version being updated to
    pub setup_ref: PluginSetupRef,
    /// Applied setup id the caller believes is current
    pub current_applied_setup_id: Hash,
    pub init_data: Vec<u8>,
    pub permissions: Vec<MultiTargetPermission>,
    pub helpers_hash: Hash,
}

impl ApplyUpdateParams {
    pub fn from_proposal(
        plugin: Address,
        setup_ref: PluginSetupRef,
        current_applied_setup_id: Hash,
        proposal: &UpdateProposal,
    ) -> Self {
        Self {
            plugin,
            setup_ref,
            current_applied_setup_id,
            init_data: proposal.init_data.clone(),
            permissions: proposal.prepared_setup_data.permissions.clone(),
            helpers_hash: proposal.prepared_setup_data.helpers_hash(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareUninstallationParams {
    /// Version currently installed
    pub setup_ref: PluginSetupRef,
    pub setup_payload: SetupPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UninstallationProposal {
    pub permissions: Vec<MultiTargetPermission>,
    pub prepared_setup_id: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyUninstallationParams {
    pub plugin: Address,
    pub setup_ref: PluginSetupRef,
    pub current_applied_setup_id: Hash,
    pub permissions: Vec<MultiTargetPermission>,
}

impl ApplyUninstallationParams {
    pub fn from_proposal(
        plugin: Address,
        setup_ref: PluginSetupRef,
        current_applied_setup_id: Hash,
        proposal: &UninstallationProposal,
    ) -> Self {
        Self {
            plugin,
            setup_ref,
            current_applied_setup_id,
            permissions: proposal.permissions.clone(),
        }
    }
}
