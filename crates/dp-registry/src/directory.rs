//! Directory of plugin repositories by address

use dp_core::{Address, PluginSetupRef};
use dp_plugin::SharedSetupHandler;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{RegistryError, Result};
use crate::repo::VersionRegistry;
use crate::version::VersionRecord;

/// Known plugin repositories
#[derive(Debug, Default)]
pub struct RepoDirectory {
    repos: RwLock<HashMap<Address, Arc<VersionRegistry>>>,
}

impl RepoDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, repo: Arc<VersionRegistry>) -> Result<()> {
        let address = repo.address();
        let mut repos = self.repos.write().await;
        if repos.contains_key(&address) {
            return Err(RegistryError::RepoAlreadyRegistered(address));
        }
        repos.insert(address, repo);
        info!(repo = %address, "Registered plugin repository");
        Ok(())
    }

    pub async fn get(&self, address: Address) -> Result<Arc<VersionRegistry>> {
        self.repos
            .read()
            .await
            .get(&address)
            .cloned()
            .ok_or(RegistryError::PluginRepoNonexistent(address))
    }

    pub async fn contains(&self, address: Address) -> bool {
        self.repos.read().await.contains_key(&address)
    }

    pub async fn len(&self) -> usize {
        self.repos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.repos.read().await.is_empty()
    }

    /// Version record and setup handler a setup reference points at
    pub async fn resolve(&self, setup_ref: &PluginSetupRef) -> Result<(VersionRecord, SharedSetupHandler)> {
        let repo = self.get(setup_ref.repo).await?;
        repo.resolve(setup_ref.version_tag).await
    }
}
