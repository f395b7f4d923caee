//! Deployed contract address space
//!
//! The host environment maps addresses to deployed objects. The setup
//! protocol only needs two questions answered about an address: is anything
//! deployed there, and does it advertise a given interface.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::hashing::hash_bytes;
use crate::types::Address;

/// Four-byte interface selector advertised by contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceId([u8; 4]);

impl InterfaceId {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Selector derived from an interface name
    pub fn from_name(name: &str) -> Self {
        let digest = hash_bytes(name.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest.as_bytes()[..4]);
        Self(bytes)
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Something deployed at an address
pub trait Contract: Send + Sync + 'static {
    /// Whether this contract implements the given interface
    fn supports_interface(&self, interface_id: InterfaceId) -> bool;

    /// Convert to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Shared registry of deployed contracts
#[derive(Default)]
pub struct AddressSpace {
    contracts: RwLock<HashMap<Address, Arc<dyn Contract>>>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a contract at `address`. Addresses are never reused.
    pub fn deploy(&self, address: Address, contract: Arc<dyn Contract>) -> Result<()> {
        if address.is_zero() {
            return Err(Error::invalid_argument("cannot deploy at the zero address"));
        }
        let mut contracts = self
            .contracts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if contracts.contains_key(&address) {
            return Err(Error::invalid_argument(format!(
                "contract already deployed at {}",
                address
            )));
        }
        contracts.insert(address, contract);
        debug!(%address, "Deployed contract");
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Option<Arc<dyn Contract>> {
        let contracts = self.contracts.read().unwrap_or_else(PoisonError::into_inner);
        contracts.get(address).cloned()
    }

    /// Whether any contract is deployed at `address`
    pub fn is_contract(&self, address: &Address) -> bool {
        let contracts = self.contracts.read().unwrap_or_else(PoisonError::into_inner);
        contracts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        let contracts = self.contracts.read().unwrap_or_else(PoisonError::into_inner);
        contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("contracts", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl Contract for Marker {
        fn supports_interface(&self, interface_id: InterfaceId) -> bool {
            interface_id == InterfaceId::from_name("Marker")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_deploy_and_lookup() {
        let space = AddressSpace::new();
        let address = Address::derive("marker");
        space.deploy(address, Arc::new(Marker)).unwrap();

        assert!(space.is_contract(&address));
        let contract = space.get(&address).unwrap();
        assert!(contract.supports_interface(InterfaceId::from_name("Marker")));
        assert!(contract.as_any().downcast_ref::<Marker>().is_some());
    }

    #[test]
    fn test_deploy_rejects_zero_and_reuse() {
        let space = AddressSpace::new();
        assert!(space.deploy(Address::ZERO, Arc::new(Marker)).is_err());

        let address = Address::derive("marker");
        space.deploy(address, Arc::new(Marker)).unwrap();
        assert!(space.deploy(address, Arc::new(Marker)).is_err());
        assert_eq!(space.len(), 1);
    }
}
