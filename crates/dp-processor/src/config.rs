//! Processor configuration from the environment

use dp_core::config::{get_config_address, get_config_path, load_environment};
use dp_core::Address;
use dp_ledger::{Journal, RetentionPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const PROCESSOR_ADDRESS_VAR: &str = "DP_PROCESSOR_ADDRESS";
pub const JOURNAL_DIR_VAR: &str = "DP_JOURNAL_DIR";

/// Label the default processor address is derived from
pub const DEFAULT_PROCESSOR_LABEL: &str = "setup-processor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Address the processor acts as when applying permissions
    pub address: Address,
    /// Persist the audit journal here when set
    pub journal_dir: Option<PathBuf>,
    pub retention: RetentionPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            address: Address::derive(DEFAULT_PROCESSOR_LABEL),
            journal_dir: None,
            retention: RetentionPolicy::default(),
        }
    }
}

impl ProcessorConfig {
    /// Read `DP_PROCESSOR_ADDRESS`, `DP_JOURNAL_DIR` and `DP_JOURNAL_RETENTION`,
    /// loading env files first
    pub fn from_env() -> Self {
        load_environment();
        Self {
            address: get_config_address(PROCESSOR_ADDRESS_VAR)
                .unwrap_or_else(|| Address::derive(DEFAULT_PROCESSOR_LABEL)),
            journal_dir: get_config_path(JOURNAL_DIR_VAR),
            retention: RetentionPolicy::from_env(),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn with_journal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    /// Open the configured journal: persistent when a directory is set,
    /// otherwise in memory
    pub async fn open_journal(&self) -> dp_core::Result<Arc<Journal>> {
        let journal = match self.journal_dir {
            Some(ref dir) => {
                info!("Opening setup journal at {:?}", dir);
                Journal::persistent(dir, self.retention).await?
            }
            None => Journal::in_memory(self.retention),
        };
        Ok(Arc::new(journal))
    }
}
