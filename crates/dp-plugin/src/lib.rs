//! dp-plugin: Interfaces the setup processor calls into
//!
//! Features:
//! - `PluginInstance`: lifecycle hooks (initialize, upgrade, uninstall) of an
//!   installed plugin
//! - `SetupHandler`: per-version logic that prepares install, update and
//!   uninstall data
//! - `PreparedSetupData` and helper hashing

pub mod plugin;
pub mod setup;

pub use plugin::{BoxedPlugin, PluginInstance, SharedPlugin};
pub use setup::{
    hash_helpers, PreparedInstallation, PreparedSetupData, PreparedUpdate, SetupHandler,
    SetupPayload, SharedSetupHandler,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::plugin::{BoxedPlugin, PluginInstance, SharedPlugin};
    pub use super::setup::{
        PreparedInstallation, PreparedSetupData, PreparedUpdate, SetupHandler, SetupPayload,
    };
}
