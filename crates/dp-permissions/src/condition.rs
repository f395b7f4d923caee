//! Permission condition contracts

use dp_core::{Address, AddressSpace, Contract, InterfaceId};
use std::any::Any;
use std::sync::Arc;

use crate::error::{PermissionError, Result};
use crate::permission::PermissionId;

/// Interface advertised by every permission condition
pub const PERMISSION_CONDITION_INTERFACE_ID: InterfaceId = InterfaceId::new([0x2f, 0xc1, 0x7e, 0x6b]);

/// Dynamic check consulted when a conditional grant is evaluated
pub trait PermissionCondition: Send + Sync + 'static {
    fn is_granted(
        &self,
        where_: Address,
        who: Address,
        permission_id: PermissionId,
        data: &[u8],
    ) -> bool;
}

/// Deployable wrapper that advertises the condition interface
pub struct ConditionContract {
    condition: Arc<dyn PermissionCondition>,
}

impl ConditionContract {
    pub fn new(condition: Arc<dyn PermissionCondition>) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> Arc<dyn PermissionCondition> {
        Arc::clone(&self.condition)
    }
}

impl Contract for ConditionContract {
    fn supports_interface(&self, interface_id: InterfaceId) -> bool {
        interface_id == PERMISSION_CONDITION_INTERFACE_ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Deploy a condition at `address` in the shared address space
pub fn deploy_condition(
    space: &AddressSpace,
    address: Address,
    condition: Arc<dyn PermissionCondition>,
) -> dp_core::Result<()> {
    space.deploy(address, Arc::new(ConditionContract::new(condition)))
}

/// Verify that `address` holds a condition contract and return it
pub(crate) fn resolve(space: &AddressSpace, address: Address) -> Result<Arc<dyn PermissionCondition>> {
    let contract = space
        .get(&address)
        .ok_or(PermissionError::ConditionNotAContract(address))?;

    if !contract.supports_interface(PERMISSION_CONDITION_INTERFACE_ID) {
        return Err(PermissionError::ConditionInterfaceNotSupported(address));
    }

    contract
        .as_any()
        .downcast_ref::<ConditionContract>()
        .map(ConditionContract::condition)
        .ok_or(PermissionError::ConditionInterfaceNotSupported(address))
}
