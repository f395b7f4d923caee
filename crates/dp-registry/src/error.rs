//! Registry error types

use dp_core::{Address, Hash};
use dp_permissions::PermissionError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Release 0 is reserved")]
    ReleaseZeroNotAllowed,

    #[error("Release {attempted} does not follow latest release {latest}")]
    InvalidReleaseIncrement { latest: u8, attempted: u8 },

    #[error("Setup handler {0} is already published in this repository")]
    PluginSetupAlreadyInPreviousRelease(Address),

    #[error("Release metadata must not be empty")]
    EmptyReleaseMetadata,

    #[error("Release {0} does not exist")]
    ReleaseDoesNotExist(u8),

    #[error("No version with tag hash {0}")]
    VersionHashDoesNotExist(Hash),

    #[error("No version is published with setup handler {0}")]
    SetupHandlerNotPublished(Address),

    #[error("Invalid setup handler address {0}")]
    InvalidSetupHandler(Address),

    #[error("Release {0} has no builds left")]
    BuildLimitReached(u8),

    #[error("No plugin repository at {0}")]
    PluginRepoNonexistent(Address),

    #[error("Repository {0} is already registered")]
    RepoAlreadyRegistered(Address),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

impl RegistryError {
    /// Whether the error reports a missing record rather than bad input
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::ReleaseDoesNotExist(_)
                | RegistryError::VersionHashDoesNotExist(_)
                | RegistryError::SetupHandlerNotPublished(_)
                | RegistryError::PluginRepoNonexistent(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
