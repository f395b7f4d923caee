//! Authorization of apply calls

use async_trait::async_trait;
use dp_core::Address;
use dp_permissions::PermissionId;
use lazy_static::lazy_static;

use crate::dao::Dao;

lazy_static! {
    pub static ref APPLY_INSTALLATION_PERMISSION_ID: PermissionId =
        PermissionId::named("APPLY_INSTALLATION_PERMISSION");
    pub static ref APPLY_UPDATE_PERMISSION_ID: PermissionId =
        PermissionId::named("APPLY_UPDATE_PERMISSION");
    pub static ref APPLY_UNINSTALLATION_PERMISSION_ID: PermissionId =
        PermissionId::named("APPLY_UNINSTALLATION_PERMISSION");
}

/// Decides whether a caller may apply setups for a DAO
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    async fn is_authorized(&self, dao: &Dao, caller: Address, permission_id: PermissionId) -> bool;
}

/// Delegates to the DAO's own permission store.
///
/// The DAO itself is always authorized; anyone else needs `permission_id`
/// granted on the processor.
#[derive(Debug, Clone, Copy)]
pub struct DaoPermissionGate {
    processor: Address,
}

impl DaoPermissionGate {
    pub fn new(processor: Address) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl AuthorizationGate for DaoPermissionGate {
    async fn is_authorized(&self, dao: &Dao, caller: Address, permission_id: PermissionId) -> bool {
        caller == dao.address() || dao.has_permission(self.processor, caller, permission_id, &[]).await
    }
}
