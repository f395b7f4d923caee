//! dp-processor: Two-phase plugin setup for DAOs
//!
//! Features:
//! - `SetupProcessor`: prepare and apply installation, update and
//!   uninstallation of plugins
//! - Content-addressed prepared and applied setup ids
//! - `Dao`: permission store plus installed plugins
//! - `AuthorizationGate` deciding who may apply setups
//! - Setup events delivered to hooks and the audit journal

pub mod config;
pub mod dao;
pub mod error;
pub mod events;
pub mod gate;
pub mod ids;
pub mod params;
pub mod processor;
pub mod state;

pub use config::ProcessorConfig;
pub use dao::{Dao, DaoDirectory};
pub use error::{ErrorKind, ProcessorError, Result};
pub use events::{HookHandler, SetupEvent, PROCESSOR_CATEGORY};
pub use gate::{
    AuthorizationGate, DaoPermissionGate, APPLY_INSTALLATION_PERMISSION_ID, APPLY_UNINSTALLATION_PERMISSION_ID,
    APPLY_UPDATE_PERMISSION_ID,
};
pub use ids::{applied_setup_id, installation_id, prepared_setup_id, PreparationType, PreparedSetupFields};
pub use params::{
    ApplyInstallationParams, ApplyUninstallationParams, ApplyUpdateParams, InstallationProposal,
    PrepareInstallationParams, PrepareUninstallationParams, PrepareUpdateParams, UninstallationProposal,
    UpdateProposal,
};
pub use processor::SetupProcessor;
pub use state::InstallationState;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::dao::Dao;
    pub use super::error::{ErrorKind, ProcessorError};
    pub use super::params::*;
    pub use super::processor::SetupProcessor;
    pub use super::ProcessorConfig;
}
