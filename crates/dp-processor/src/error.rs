//! Setup processor error types

use dp_core::{Address, Hash, PluginSetupRef, Tag};
use dp_permissions::{PermissionError, PermissionId};
use dp_registry::RegistryError;
use serde::Serialize;
use thiserror::Error;

/// Broad class of a failure, telling the caller how to recover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed request, rejected before touching state
    Input,
    /// Referenced repo, version, installation or proposal does not exist
    NotFound,
    Unauthorized,
    /// Caller's view of state is stale; re-read and re-prepare
    Consistency,
    /// A setup handler or plugin hook failed
    Downstream,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("Setup {0} is already prepared")]
    SetupAlreadyPrepared(Hash),

    #[error("Setup {0} is not applicable")]
    SetupNotApplicable(Hash),

    #[error("Caller {caller} may not apply setups for DAO {dao} (missing {permission_id})")]
    SetupApplicationUnauthorized {
        dao: Address,
        caller: Address,
        permission_id: PermissionId,
    },

    #[error("Applied setup id is {current}, caller stated {stated}")]
    InvalidAppliedSetupId { current: Hash, stated: Hash },

    #[error("Plugin {plugin} is already installed in DAO {dao}")]
    PluginAlreadyInstalled { dao: Address, plugin: Address },

    #[error("Plugin {plugin} is not installed in DAO {dao}")]
    PluginNotInstalled { dao: Address, plugin: Address },

    #[error("Plugin {0} cannot be upgraded")]
    PluginNonupgradeable(Address),

    #[error("Cannot update from {current} to {new}")]
    InvalidUpdateVersion { current: Tag, new: Tag },

    #[error("Installed setup is {recorded}, caller stated {stated}")]
    CurrentVersionMismatch {
        recorded: PluginSetupRef,
        stated: PluginSetupRef,
    },

    #[error("Helpers hash is {expected}, payload hashes to {actual}")]
    CurrentHelpersMismatch { expected: Hash, actual: Hash },

    #[error("Setup handler {handler} failed: {reason}")]
    SetupHandlerFailed { handler: Address, reason: String },

    #[error("Upgrade of plugin {plugin} to {implementation} failed: {reason}")]
    PluginProxyUpgradeFailed {
        plugin: Address,
        implementation: Address,
        reason: String,
    },

    #[error("Initialization of plugin {plugin} failed: {reason}")]
    PluginInitializationFailed { plugin: Address, reason: String },

    #[error("Uninstall hook of plugin {plugin} failed: {reason}")]
    PluginUninstallFailed { plugin: Address, reason: String },

    #[error("DAO {0} is not registered with this processor")]
    DaoNotRegistered(Address),

    #[error("DAO handle for {0} is not the registered instance")]
    DaoHandleMismatch(Address),

    #[error("DAO {0} is already registered")]
    DaoAlreadyRegistered(Address),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

impl ProcessorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessorError::PluginNonupgradeable(_)
            | ProcessorError::InvalidUpdateVersion { .. }
            | ProcessorError::DaoAlreadyRegistered(_) => ErrorKind::Input,
            ProcessorError::PluginNotInstalled { .. } | ProcessorError::DaoNotRegistered(_) => ErrorKind::NotFound,
            ProcessorError::SetupApplicationUnauthorized { .. } | ProcessorError::DaoHandleMismatch(_) => {
                ErrorKind::Unauthorized
            }
            ProcessorError::SetupAlreadyPrepared(_)
            | ProcessorError::SetupNotApplicable(_)
            | ProcessorError::InvalidAppliedSetupId { .. }
            | ProcessorError::PluginAlreadyInstalled { .. }
            | ProcessorError::CurrentVersionMismatch { .. }
            | ProcessorError::CurrentHelpersMismatch { .. } => ErrorKind::Consistency,
            ProcessorError::SetupHandlerFailed { .. }
            | ProcessorError::PluginProxyUpgradeFailed { .. }
            | ProcessorError::PluginInitializationFailed { .. }
            | ProcessorError::PluginUninstallFailed { .. } => ErrorKind::Downstream,
            ProcessorError::Registry(e) if e.is_not_found() => ErrorKind::NotFound,
            ProcessorError::Registry(RegistryError::Permission(e)) | ProcessorError::Permission(e) => {
                permission_kind(e)
            }
            ProcessorError::Registry(_) => ErrorKind::Input,
        }
    }
}

fn permission_kind(error: &PermissionError) -> ErrorKind {
    match error {
        PermissionError::Unauthorized { .. } => ErrorKind::Unauthorized,
        PermissionError::PermissionAlreadyGrantedForDifferentCondition { .. } => ErrorKind::Consistency,
        _ => ErrorKind::Input,
    }
}

pub type Result<T> = std::result::Result<T, ProcessorError>;
