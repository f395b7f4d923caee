//! Setup lifecycle notifications

use dp_core::{Address, Hash, PluginSetupRef};
use dp_ledger::Footprint;
use dp_permissions::MultiTargetPermission;
use dp_plugin::PreparedSetupData;
use serde::Serialize;
use std::sync::Arc;

/// Footprint category used for processor notifications
pub const PROCESSOR_CATEGORY: &str = "setup_processor";

/// Setup processor event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SetupEvent {
    InstallationPrepared {
        dao: Address,
        plugin: Address,
        setup_ref: PluginSetupRef,
        prepared_setup_id: Hash,
        prepared_setup_data: PreparedSetupData,
    },
    InstallationApplied {
        dao: Address,
        plugin: Address,
        prepared_setup_id: Hash,
        applied_setup_id: Hash,
    },
    UpdatePrepared {
        dao: Address,
        plugin: Address,
        setup_ref: PluginSetupRef,
        prepared_setup_id: Hash,
        init_data: Vec<u8>,
        prepared_setup_data: PreparedSetupData,
    },
    UpdateApplied {
        dao: Address,
        plugin: Address,
        prepared_setup_id: Hash,
        applied_setup_id: Hash,
    },
    UninstallationPrepared {
        dao: Address,
        plugin: Address,
        setup_ref: PluginSetupRef,
        prepared_setup_id: Hash,
        permissions: Vec<MultiTargetPermission>,
    },
    UninstallationApplied {
        dao: Address,
        plugin: Address,
        prepared_setup_id: Hash,
    },
}

impl SetupEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SetupEvent::InstallationPrepared { .. } => "installation_prepared",
            SetupEvent::InstallationApplied { .. } => "installation_applied",
            SetupEvent::UpdatePrepared { .. } => "update_prepared",
            SetupEvent::UpdateApplied { .. } => "update_applied",
            SetupEvent::UninstallationPrepared { .. } => "uninstallation_prepared",
            SetupEvent::UninstallationApplied { .. } => "uninstallation_applied",
        }
    }

    pub fn to_footprint(&self) -> Footprint {
        Footprint::new(
            PROCESSOR_CATEGORY,
            self.name(),
            serde_json::to_value(self).unwrap_or_default(),
        )
    }
}

/// Hook handler type
pub type HookHandler = Arc<dyn Fn(&SetupEvent) -> anyhow::Result<()> + Send + Sync>;
