//! Validation and hashing of permission batches
//!
//! Setup handlers hand back a list of permission ops. Before anything is
//! recorded or applied the batch is checked here: wildcard rules, condition
//! contracts, and whether the call site accepts the operation at all.

use dp_core::{Address, AddressSpace, ContentHasher, Hash};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::condition::{self, PermissionCondition};
use crate::error::{PermissionError, Result};
use crate::permission::{
    MultiTargetPermission, PermissionId, PermissionOperation, EXECUTE_PERMISSION_ID,
    ROOT_PERMISSION_ID,
};

/// Which operations a call site accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationScope {
    /// Grants, conditional grants and revokes
    Any,
    /// Plain grants and revokes only
    Unconditional,
    /// Revokes only (teardown)
    RevokeOnly,
}

/// Checks permission ops against wildcard, condition and scope rules
#[derive(Debug, Clone)]
pub struct PermissionDiffEngine {
    contracts: Arc<AddressSpace>,
    restricted_for_any: BTreeSet<PermissionId>,
}

impl PermissionDiffEngine {
    /// Engine resolving conditions in `contracts`, with the default
    /// restricted set (`ROOT`, `EXECUTE`)
    pub fn new(contracts: Arc<AddressSpace>) -> Self {
        Self {
            contracts,
            restricted_for_any: [*ROOT_PERMISSION_ID, *EXECUTE_PERMISSION_ID]
                .into_iter()
                .collect(),
        }
    }

    /// Add permission ids that may never be granted with an `Any` target
    pub fn with_restricted_for_any(mut self, ids: impl IntoIterator<Item = PermissionId>) -> Self {
        self.restricted_for_any.extend(ids);
        self
    }

    pub fn contracts(&self) -> &Arc<AddressSpace> {
        &self.contracts
    }

    pub fn is_restricted_for_any(&self, permission_id: &PermissionId) -> bool {
        self.restricted_for_any.contains(permission_id)
    }

    /// Validate every op of a batch, stopping at the first violation
    pub fn validate(&self, ops: &[MultiTargetPermission], scope: OperationScope) -> Result<()> {
        ops.iter().try_for_each(|op| self.validate_op(op, scope))
    }

    pub fn validate_op(&self, op: &MultiTargetPermission, scope: OperationScope) -> Result<()> {
        if op.where_.is_any() && op.who.is_any() {
            return Err(PermissionError::AnyAddressDisallowedForWhoAndWhere);
        }

        match op.operation {
            PermissionOperation::Revoke => Ok(()),
            PermissionOperation::Grant => {
                if scope == OperationScope::RevokeOnly {
                    return Err(PermissionError::OperationNotAllowed {
                        operation: op.operation,
                    });
                }
                if op.where_.is_any() || op.who.is_any() {
                    return Err(PermissionError::PermissionsForAnyAddressDisallowed {
                        permission_id: op.permission_id,
                    });
                }
                Ok(())
            }
            PermissionOperation::GrantWithCondition => {
                if scope != OperationScope::Any {
                    return Err(PermissionError::GrantWithConditionNotSupported);
                }
                let condition = op
                    .condition
                    .ok_or(PermissionError::ConditionNotAContract(Address::ZERO))?;
                self.resolve_condition(condition)?;

                if (op.where_.is_any() || op.who.is_any())
                    && self.is_restricted_for_any(&op.permission_id)
                {
                    return Err(PermissionError::PermissionsForAnyAddressDisallowed {
                        permission_id: op.permission_id,
                    });
                }
                Ok(())
            }
        }
    }

    /// Resolve a condition contract, verifying it is deployed and advertises
    /// the condition interface
    pub fn resolve_condition(&self, address: Address) -> Result<Arc<dyn PermissionCondition>> {
        condition::resolve(&self.contracts, address)
    }
}

/// Canonical content hash of an ordered permission batch
pub fn hash_permissions(ops: &[MultiTargetPermission]) -> Hash {
    let mut hasher = ContentHasher::new("dp.permissions").u64(ops.len() as u64);
    for op in ops {
        hasher = hasher.u8(op.operation.code());
        hasher = op.where_.hash_into(hasher);
        hasher = op.who.hash_into(hasher);
        hasher = match op.condition {
            Some(condition) => hasher.u8(1).address(&condition),
            None => hasher.u8(0),
        };
        hasher = hasher.hash(op.permission_id.as_hash());
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::deploy_condition;
    use crate::permission::Target;
    use dp_core::Contract;
    use std::any::Any;

    struct AlwaysTrue;

    impl PermissionCondition for AlwaysTrue {
        fn is_granted(&self, _: Address, _: Address, _: PermissionId, _: &[u8]) -> bool {
            true
        }
    }

    struct NotACondition;

    impl Contract for NotACondition {
        fn supports_interface(&self, _: dp_core::InterfaceId) -> bool {
            false
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn engine() -> (PermissionDiffEngine, Address, Address) {
        let space = Arc::new(AddressSpace::new());
        let condition = Address::derive("condition");
        let plain = Address::derive("plain-contract");
        deploy_condition(&space, condition, Arc::new(AlwaysTrue)).unwrap();
        space.deploy(plain, Arc::new(NotACondition)).unwrap();
        (PermissionDiffEngine::new(space), condition, plain)
    }

    fn custom_permission() -> PermissionId {
        PermissionId::named("MINT_PERMISSION")
    }

    #[test]
    fn test_rejects_double_wildcard_for_every_operation() {
        let (engine, condition, _) = engine();
        let ops = [
            MultiTargetPermission::revoke(Target::Any, Target::Any, custom_permission()),
            MultiTargetPermission::grant_with_condition(Target::Any, Target::Any, custom_permission(), condition),
        ];
        for op in ops {
            assert_eq!(
                engine.validate_op(&op, OperationScope::Any),
                Err(PermissionError::AnyAddressDisallowedForWhoAndWhere)
            );
        }
    }

    #[test]
    fn test_plain_grant_to_any_is_rejected() {
        let (engine, _, _) = engine();
        let mut op = MultiTargetPermission::grant(Address::derive("dao"), Address::derive("x"), custom_permission());
        op.who = Target::Any;
        assert_eq!(
            engine.validate_op(&op, OperationScope::Any),
            Err(PermissionError::PermissionsForAnyAddressDisallowed {
                permission_id: custom_permission()
            })
        );
    }

    #[test]
    fn test_conditional_grant_verifies_condition_contract() {
        let (engine, condition, plain) = engine();
        let dao = Address::derive("dao");
        let who = Address::derive("who");

        let ok = MultiTargetPermission::grant_with_condition(dao, who, custom_permission(), condition);
        assert!(engine.validate_op(&ok, OperationScope::Any).is_ok());

        let missing = Address::derive("nothing-here");
        let op = MultiTargetPermission::grant_with_condition(dao, who, custom_permission(), missing);
        assert_eq!(
            engine.validate_op(&op, OperationScope::Any),
            Err(PermissionError::ConditionNotAContract(missing))
        );

        let op = MultiTargetPermission::grant_with_condition(dao, who, custom_permission(), plain);
        assert_eq!(
            engine.validate_op(&op, OperationScope::Any),
            Err(PermissionError::ConditionInterfaceNotSupported(plain))
        );
    }

    #[test]
    fn test_conditional_grant_with_single_wildcard() {
        let (engine, condition, _) = engine();
        let dao = Address::derive("dao");

        let op = MultiTargetPermission::grant_with_condition(dao, Target::Any, custom_permission(), condition);
        assert!(engine.validate_op(&op, OperationScope::Any).is_ok());

        let op = MultiTargetPermission::grant_with_condition(dao, Target::Any, *ROOT_PERMISSION_ID, condition);
        assert_eq!(
            engine.validate_op(&op, OperationScope::Any),
            Err(PermissionError::PermissionsForAnyAddressDisallowed {
                permission_id: *ROOT_PERMISSION_ID
            })
        );
    }

    #[test]
    fn test_scopes_restrict_operations() {
        let (engine, condition, _) = engine();
        let dao = Address::derive("dao");
        let who = Address::derive("who");
        let conditional = MultiTargetPermission::grant_with_condition(dao, who, custom_permission(), condition);
        let grant = MultiTargetPermission::grant(dao, who, custom_permission());
        let revoke = MultiTargetPermission::revoke(dao, who, custom_permission());

        assert_eq!(
            engine.validate_op(&conditional, OperationScope::Unconditional),
            Err(PermissionError::GrantWithConditionNotSupported)
        );
        assert!(engine.validate_op(&grant, OperationScope::Unconditional).is_ok());

        assert_eq!(
            engine.validate_op(&grant, OperationScope::RevokeOnly),
            Err(PermissionError::OperationNotAllowed {
                operation: PermissionOperation::Grant
            })
        );
        assert_eq!(
            engine.validate_op(&conditional, OperationScope::RevokeOnly),
            Err(PermissionError::GrantWithConditionNotSupported)
        );
        assert!(engine.validate_op(&revoke, OperationScope::RevokeOnly).is_ok());
    }

    #[test]
    fn test_hash_permissions_is_order_sensitive() {
        let dao = Address::derive("dao");
        let a = MultiTargetPermission::grant(dao, Address::derive("a"), custom_permission());
        let b = MultiTargetPermission::grant(dao, Address::derive("b"), custom_permission());

        assert_eq!(hash_permissions(&[a, b]), hash_permissions(&[a, b]));
        assert_ne!(hash_permissions(&[a, b]), hash_permissions(&[b, a]));
        assert_ne!(hash_permissions(&[]), hash_permissions(&[a]));
    }
}
