//! Permission identifiers, targets and operations

use dp_core::{hash_bytes, Address, ContentHasher, Hash};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a permission, the hash of its name
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionId(Hash);

impl PermissionId {
    /// Permission id for a well-known name, e.g. `"ROOT_PERMISSION"`
    pub fn named(name: &str) -> Self {
        Self(hash_bytes(name.as_bytes()))
    }

    pub const fn from_hash(hash: Hash) -> Self {
        Self(hash)
    }

    pub fn as_hash(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionId({})", self.0.short())
    }
}

lazy_static! {
    /// Grants authority to manage the permission store itself
    pub static ref ROOT_PERMISSION_ID: PermissionId = PermissionId::named("ROOT_PERMISSION");
    /// Grants authority to execute actions on behalf of the owner
    pub static ref EXECUTE_PERMISSION_ID: PermissionId = PermissionId::named("EXECUTE_PERMISSION");
}

/// `where` or `who` side of a permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Wildcard matching every address
    Any,
    Address(Address),
}

impl Target {
    pub fn is_any(&self) -> bool {
        matches!(self, Target::Any)
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            Target::Any => None,
            Target::Address(address) => Some(*address),
        }
    }

    pub(crate) fn hash_into(&self, hasher: ContentHasher) -> ContentHasher {
        match self {
            Target::Any => hasher.u8(0),
            Target::Address(address) => hasher.u8(1).address(address),
        }
    }
}

impl From<Address> for Target {
    fn from(address: Address) -> Self {
        Target::Address(address)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Any => f.write_str("ANY"),
            Target::Address(address) => write!(f, "{}", address),
        }
    }
}

/// Kind of permission mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOperation {
    Grant,
    Revoke,
    GrantWithCondition,
}

impl PermissionOperation {
    pub(crate) fn code(&self) -> u8 {
        match self {
            PermissionOperation::Grant => 0,
            PermissionOperation::Revoke => 1,
            PermissionOperation::GrantWithCondition => 2,
        }
    }
}

impl fmt::Display for PermissionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionOperation::Grant => f.write_str("grant"),
            PermissionOperation::Revoke => f.write_str("revoke"),
            PermissionOperation::GrantWithCondition => f.write_str("grant_with_condition"),
        }
    }
}

/// A permission mutation that names its own `where`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultiTargetPermission {
    pub operation: PermissionOperation,
    #[serde(rename = "where")]
    pub where_: Target,
    pub who: Target,
    pub condition: Option<Address>,
    pub permission_id: PermissionId,
}

/// Permission ops produced by setup handlers always carry their target
pub type PermissionOp = MultiTargetPermission;

impl MultiTargetPermission {
    /// Plain grant between two concrete addresses
    pub fn grant(where_: Address, who: Address, permission_id: PermissionId) -> Self {
        Self {
            operation: PermissionOperation::Grant,
            where_: Target::Address(where_),
            who: Target::Address(who),
            condition: None,
            permission_id,
        }
    }

    pub fn grant_with_condition(
        where_: impl Into<Target>,
        who: impl Into<Target>,
        permission_id: PermissionId,
        condition: Address,
    ) -> Self {
        Self {
            operation: PermissionOperation::GrantWithCondition,
            where_: where_.into(),
            who: who.into(),
            condition: Some(condition),
            permission_id,
        }
    }

    pub fn revoke(where_: impl Into<Target>, who: impl Into<Target>, permission_id: PermissionId) -> Self {
        Self {
            operation: PermissionOperation::Revoke,
            where_: where_.into(),
            who: who.into(),
            condition: None,
            permission_id,
        }
    }
}

impl fmt::Display for MultiTargetPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} where={} who={}",
            self.operation, self.permission_id, self.where_, self.who
        )?;
        if let Some(condition) = self.condition {
            write!(f, " condition={}", condition)?;
        }
        Ok(())
    }
}

/// A permission mutation whose `where` is supplied by the call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SingleTargetPermission {
    pub operation: PermissionOperation,
    pub who: Target,
    pub permission_id: PermissionId,
}

impl SingleTargetPermission {
    pub fn grant(who: Address, permission_id: PermissionId) -> Self {
        Self {
            operation: PermissionOperation::Grant,
            who: Target::Address(who),
            permission_id,
        }
    }

    pub fn revoke(who: impl Into<Target>, permission_id: PermissionId) -> Self {
        Self {
            operation: PermissionOperation::Revoke,
            who: who.into(),
            permission_id,
        }
    }

    /// Expand into a multi-target op on `where_`
    pub fn on(self, where_: Address) -> MultiTargetPermission {
        MultiTargetPermission {
            operation: self.operation,
            where_: Target::Address(where_),
            who: self.who,
            condition: None,
            permission_id: self.permission_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_ids_are_stable_and_distinct() {
        assert_eq!(PermissionId::named("ROOT_PERMISSION"), *ROOT_PERMISSION_ID);
        assert_ne!(*ROOT_PERMISSION_ID, *EXECUTE_PERMISSION_ID);
    }

    #[test]
    fn test_single_target_expands_with_where() {
        let who = Address::derive("who");
        let where_ = Address::derive("where");
        let op = SingleTargetPermission::grant(who, *EXECUTE_PERMISSION_ID).on(where_);

        assert_eq!(op, MultiTargetPermission::grant(where_, who, *EXECUTE_PERMISSION_ID));
    }

    #[test]
    fn test_where_serializes_without_underscore() {
        let op = MultiTargetPermission::revoke(Target::Any, Address::derive("who"), *EXECUTE_PERMISSION_ID);
        let json = serde_json::to_value(op).unwrap();
        assert_eq!(json["where"], serde_json::json!("any"));
        assert!(json.get("where_").is_none());
    }
}
