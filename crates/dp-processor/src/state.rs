//! Per-installation bookkeeping of the setup processor

use dp_core::{Address, Hash, PluginSetupRef};
use dp_plugin::SharedPlugin;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Setup currently in force for an installed plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationState {
    pub installation_id: Hash,
    pub dao: Address,
    pub plugin: Address,
    /// Sequence of the last applied transition for this installation
    pub last_apply_sequence: u64,
    pub current_applied_setup_id: Hash,
    pub setup_ref: PluginSetupRef,
    pub helpers_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppliedSetup {
    pub applied_setup_id: Hash,
    pub setup_ref: PluginSetupRef,
    pub helpers_hash: Hash,
}

/// Everything the processor tracks for one `(dao, plugin)` pair.
///
/// A prepared id is live while the sequence it was prepared at is greater
/// than `last_apply_sequence`, so any apply retires every other proposal.
#[derive(Default)]
pub(crate) struct InstallationRecord {
    pub last_apply_sequence: u64,
    pub current: Option<AppliedSetup>,
    prepared: HashMap<Hash, u64>,
    /// Plugins deployed by installation proposals, by prepared id
    deployed: HashMap<Hash, SharedPlugin>,
}

impl InstallationRecord {
    pub fn is_live(&self, prepared_setup_id: &Hash) -> bool {
        self.prepared
            .get(prepared_setup_id)
            .is_some_and(|seq| *seq > self.last_apply_sequence)
    }

    /// Record a proposal at `sequence`. Returns false if it is already live.
    pub fn prepare(&mut self, prepared_setup_id: Hash, sequence: u64) -> bool {
        if self.is_live(&prepared_setup_id) {
            return false;
        }
        self.prepared.insert(prepared_setup_id, sequence);
        true
    }

    pub fn hold_deployment(&mut self, prepared_setup_id: Hash, plugin: SharedPlugin) {
        self.deployed.insert(prepared_setup_id, plugin);
    }

    pub fn deployment(&self, prepared_setup_id: &Hash) -> Option<SharedPlugin> {
        self.deployed.get(prepared_setup_id).cloned()
    }

    /// Mark a transition applied at `sequence`, dropping retired proposals
    pub fn applied(&mut self, sequence: u64, current: Option<AppliedSetup>) {
        self.last_apply_sequence = sequence;
        self.current = current;
        self.prepared.clear();
        self.deployed.clear();
    }

    pub fn state(&self, dao: Address, plugin: Address, installation_id: Hash) -> Option<InstallationState> {
        self.current.as_ref().map(|current| InstallationState {
            installation_id,
            dao,
            plugin,
            last_apply_sequence: self.last_apply_sequence,
            current_applied_setup_id: current.applied_setup_id,
            setup_ref: current.setup_ref,
            helpers_hash: current.helpers_hash,
        })
    }

    pub fn pending(&self) -> usize {
        self.prepared
            .values()
            .filter(|seq| **seq > self.last_apply_sequence)
            .count()
    }
}
