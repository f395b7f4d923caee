//! The governed root object plugins attach to

use dp_core::Address;
use dp_permissions::{
    MultiTargetPermission, PermissionChange, PermissionDiffEngine, PermissionId, PermissionManager,
    SingleTargetPermission, Target,
};
use dp_plugin::SharedPlugin;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ProcessorError, Result};

/// A DAO: its permission store and the plugins installed into it
pub struct Dao {
    address: Address,
    permissions: RwLock<PermissionManager>,
    plugins: RwLock<BTreeMap<Address, SharedPlugin>>,
}

impl Dao {
    /// Create a DAO at `address`, granting `ROOT_PERMISSION` on it to `initial_root`
    pub fn new(address: Address, initial_root: Address, engine: PermissionDiffEngine) -> Self {
        Self {
            address,
            permissions: RwLock::new(PermissionManager::new(address, initial_root, engine)),
            plugins: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn has_permission(&self, where_: Address, who: Address, permission_id: PermissionId, data: &[u8]) -> bool {
        self.permissions
            .read()
            .await
            .is_granted(where_, who, permission_id, data)
    }

    pub async fn grant(
        &self,
        caller: Address,
        where_: Address,
        who: Address,
        permission_id: PermissionId,
    ) -> dp_permissions::Result<PermissionChange> {
        self.permissions.write().await.grant(caller, where_, who, permission_id)
    }

    pub async fn grant_with_condition(
        &self,
        caller: Address,
        where_: impl Into<Target>,
        who: impl Into<Target>,
        permission_id: PermissionId,
        condition: Address,
    ) -> dp_permissions::Result<PermissionChange> {
        self.permissions
            .write()
            .await
            .grant_with_condition(caller, where_, who, permission_id, condition)
    }

    pub async fn revoke(
        &self,
        caller: Address,
        where_: impl Into<Target>,
        who: impl Into<Target>,
        permission_id: PermissionId,
    ) -> dp_permissions::Result<PermissionChange> {
        self.permissions.write().await.revoke(caller, where_, who, permission_id)
    }

    pub async fn apply_single_target_permissions(
        &self,
        caller: Address,
        where_: Address,
        items: &[SingleTargetPermission],
    ) -> dp_permissions::Result<Vec<PermissionChange>> {
        self.permissions
            .write()
            .await
            .apply_single_target_permissions(caller, where_, items)
    }

    pub async fn apply_multi_target_permissions(
        &self,
        caller: Address,
        items: &[MultiTargetPermission],
    ) -> dp_permissions::Result<Vec<PermissionChange>> {
        self.permissions
            .write()
            .await
            .apply_multi_target_permissions(caller, items)
    }

    /// Copy of the current permission store
    pub async fn permissions(&self) -> PermissionManager {
        self.permissions.read().await.clone()
    }

    pub(crate) fn permission_store(&self) -> &RwLock<PermissionManager> {
        &self.permissions
    }

    pub async fn plugin(&self, address: Address) -> Option<SharedPlugin> {
        self.plugins.read().await.get(&address).cloned()
    }

    pub async fn is_installed(&self, plugin: Address) -> bool {
        self.plugins.read().await.contains_key(&plugin)
    }

    /// Addresses of the installed plugins, in address order
    pub async fn installed_plugins(&self) -> Vec<Address> {
        self.plugins.read().await.keys().copied().collect()
    }

    pub(crate) async fn attach(&self, address: Address, plugin: SharedPlugin) {
        self.plugins.write().await.insert(address, plugin);
        debug!(dao = %self.address, plugin = %address, "Attached plugin");
    }

    pub(crate) async fn detach(&self, address: Address) -> Option<SharedPlugin> {
        let removed = self.plugins.write().await.remove(&address);
        debug!(dao = %self.address, plugin = %address, "Detached plugin");
        removed
    }
}

impl std::fmt::Debug for Dao {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// DAOs a processor serves, by address
#[derive(Debug, Default)]
pub struct DaoDirectory {
    daos: RwLock<HashMap<Address, Arc<Dao>>>,
}

impl DaoDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, dao: Arc<Dao>) -> Result<()> {
        let address = dao.address();
        let mut daos = self.daos.write().await;
        if daos.contains_key(&address) {
            return Err(ProcessorError::DaoAlreadyRegistered(address));
        }
        daos.insert(address, dao);
        info!(dao = %address, "Registered DAO");
        Ok(())
    }

    pub async fn get(&self, address: Address) -> Option<Arc<Dao>> {
        self.daos.read().await.get(&address).cloned()
    }

    pub async fn contains(&self, address: Address) -> bool {
        self.daos.read().await.contains_key(&address)
    }

    pub async fn len(&self) -> usize {
        self.daos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.daos.read().await.is_empty()
    }

    /// Require `dao` to be the very object registered under its address
    pub async fn verify(&self, dao: &Dao) -> Result<()> {
        let address = dao.address();
        let registered = self
            .get(address)
            .await
            .ok_or(ProcessorError::DaoNotRegistered(address))?;
        if !std::ptr::eq(Arc::as_ptr(&registered), dao) {
            return Err(ProcessorError::DaoHandleMismatch(address));
        }
        Ok(())
    }
}
