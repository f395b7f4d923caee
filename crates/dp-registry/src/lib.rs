//! dp-registry: Versioned plugin repositories
//!
//! Features:
//! - `VersionRegistry`: append-only `(release, build)` versions of one plugin,
//!   each bound to a setup handler
//! - Maintainer-gated publishing and release metadata
//! - `RepoDirectory`: lookup of repositories by address

pub mod directory;
pub mod error;
pub mod repo;
pub mod version;

pub use directory::RepoDirectory;
pub use error::{RegistryError, Result};
pub use repo::{RegistryEvent, RegistryHook, VersionRegistry, MAINTAINER_PERMISSION_ID, REPO_CATEGORY};
pub use version::{VersionArena, VersionRecord};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::directory::RepoDirectory;
    pub use super::error::RegistryError;
    pub use super::repo::{VersionRegistry, MAINTAINER_PERMISSION_ID};
    pub use super::version::VersionRecord;
}
