//! Permission store owned by a DAO or a repository
//!
//! Entries are keyed by the content hash of `(where, who, permissionId)`.
//! An entry is either an unconditional allow or a pointer to a condition
//! contract; a missing entry means the permission is not granted.

use dp_core::{Address, ContentHasher, Hash};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::engine::{OperationScope, PermissionDiffEngine};
use crate::error::{PermissionError, Result};
use crate::permission::{
    MultiTargetPermission, PermissionId, PermissionOperation, SingleTargetPermission, Target,
    ROOT_PERMISSION_ID,
};

/// Value stored for a granted permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionFlag {
    Allow,
    Condition(Address),
}

impl PermissionFlag {
    fn condition(&self) -> Option<Address> {
        match self {
            PermissionFlag::Allow => None,
            PermissionFlag::Condition(address) => Some(*address),
        }
    }
}

#[derive(Debug, Clone)]
struct PermissionEntry {
    where_: Target,
    who: Target,
    permission_id: PermissionId,
    flag: PermissionFlag,
}

/// Effect an op had on the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Granted,
    Revoked,
    /// The store already matched the requested state
    Unchanged,
}

/// One effective change reported by an apply call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionChange {
    pub kind: ChangeKind,
    #[serde(rename = "where")]
    pub where_: Target,
    pub who: Target,
    pub permission_id: PermissionId,
    pub condition: Option<Address>,
}

/// Hash-keyed permission store
#[derive(Debug, Clone)]
pub struct PermissionManager {
    owner: Address,
    entries: HashMap<Hash, PermissionEntry>,
    engine: PermissionDiffEngine,
}

fn permission_hash(where_: &Target, who: &Target, permission_id: &PermissionId) -> Hash {
    let hasher = ContentHasher::new("dp.permission");
    let hasher = where_.hash_into(hasher);
    let hasher = who.hash_into(hasher);
    hasher.hash(permission_id.as_hash()).finish()
}

impl PermissionManager {
    /// Create the store of `owner`, granting `ROOT_PERMISSION` on it to `initial_root`
    pub fn new(owner: Address, initial_root: Address, engine: PermissionDiffEngine) -> Self {
        let mut manager = Self {
            owner,
            entries: HashMap::new(),
            engine,
        };
        manager.insert(
            Target::Address(owner),
            Target::Address(initial_root),
            *ROOT_PERMISSION_ID,
            PermissionFlag::Allow,
        );
        manager
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn engine(&self) -> &PermissionDiffEngine {
        &self.engine
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entry for an exact `(where, who, permissionId)` triple
    pub fn flag(&self, where_: Target, who: Target, permission_id: PermissionId) -> Option<PermissionFlag> {
        self.entries
            .get(&permission_hash(&where_, &who, &permission_id))
            .map(|e| e.flag)
    }

    /// Whether `who` holds `permission_id` on `where_`.
    ///
    /// Checks the exact pair, then `who` on any target, then any caller on
    /// `where_`. Conditional entries are evaluated with `data`.
    pub fn is_granted(&self, where_: Address, who: Address, permission_id: PermissionId, data: &[u8]) -> bool {
        let candidates = [
            (Target::Address(where_), Target::Address(who)),
            (Target::Address(where_), Target::Any),
            (Target::Any, Target::Address(who)),
        ];

        candidates.iter().any(|(w, h)| {
            match self.flag(*w, *h, permission_id) {
                None => false,
                Some(PermissionFlag::Allow) => true,
                Some(PermissionFlag::Condition(address)) => self
                    .engine
                    .resolve_condition(address)
                    .map(|c| c.is_granted(where_, who, permission_id, data))
                    .unwrap_or(false),
            }
        })
    }

    fn require_root(&self, caller: Address) -> Result<()> {
        if self.is_granted(self.owner, caller, *ROOT_PERMISSION_ID, &[]) {
            Ok(())
        } else {
            Err(PermissionError::Unauthorized {
                where_: self.owner,
                who: caller,
                permission_id: *ROOT_PERMISSION_ID,
            })
        }
    }

    /// Grant unconditionally. Caller must hold `ROOT_PERMISSION` on the owner.
    pub fn grant(
        &mut self,
        caller: Address,
        where_: Address,
        who: Address,
        permission_id: PermissionId,
    ) -> Result<PermissionChange> {
        self.require_root(caller)?;
        self.apply_op(&MultiTargetPermission::grant(where_, who, permission_id), OperationScope::Any)
    }

    pub fn grant_with_condition(
        &mut self,
        caller: Address,
        where_: impl Into<Target>,
        who: impl Into<Target>,
        permission_id: PermissionId,
        condition: Address,
    ) -> Result<PermissionChange> {
        self.require_root(caller)?;
        self.apply_op(
            &MultiTargetPermission::grant_with_condition(where_, who, permission_id, condition),
            OperationScope::Any,
        )
    }

    pub fn revoke(
        &mut self,
        caller: Address,
        where_: impl Into<Target>,
        who: impl Into<Target>,
        permission_id: PermissionId,
    ) -> Result<PermissionChange> {
        self.require_root(caller)?;
        self.apply_op(&MultiTargetPermission::revoke(where_, who, permission_id), OperationScope::Any)
    }

    /// Apply ops that all target `where_`. Conditional grants are rejected.
    pub fn apply_single_target_permissions(
        &mut self,
        caller: Address,
        where_: Address,
        items: &[SingleTargetPermission],
    ) -> Result<Vec<PermissionChange>> {
        let ops: Vec<MultiTargetPermission> = items.iter().map(|item| item.on(where_)).collect();
        if items
            .iter()
            .any(|item| item.operation == PermissionOperation::GrantWithCondition)
        {
            return Err(PermissionError::GrantWithConditionNotSupported);
        }
        self.apply_batch(caller, &ops, OperationScope::Unconditional)
    }

    /// Apply ops that each name their own target
    pub fn apply_multi_target_permissions(
        &mut self,
        caller: Address,
        items: &[MultiTargetPermission],
    ) -> Result<Vec<PermissionChange>> {
        self.apply_batch(caller, items, OperationScope::Any)
    }

    /// Apply a batch in order. Either every op lands or none does.
    pub fn apply_batch(
        &mut self,
        caller: Address,
        items: &[MultiTargetPermission],
        scope: OperationScope,
    ) -> Result<Vec<PermissionChange>> {
        self.require_root(caller)?;

        let snapshot = self.entries.clone();
        let mut changes = Vec::with_capacity(items.len());
        for op in items {
            match self.apply_op(op, scope) {
                Ok(change) => changes.push(change),
                Err(e) => {
                    self.entries = snapshot;
                    debug!(error = %e, "Permission batch rejected");
                    return Err(e);
                }
            }
        }

        info!(
            owner = %self.owner,
            ops = items.len(),
            changed = changes.iter().filter(|c| c.kind != ChangeKind::Unchanged).count(),
            "Applied permission batch"
        );
        Ok(changes)
    }

    fn apply_op(&mut self, op: &MultiTargetPermission, scope: OperationScope) -> Result<PermissionChange> {
        self.engine.validate_op(op, scope)?;

        let key = permission_hash(&op.where_, &op.who, &op.permission_id);
        let current = self.entries.get(&key).map(|e| e.flag);

        let kind = match op.operation {
            PermissionOperation::Revoke => {
                if self.entries.remove(&key).is_some() {
                    ChangeKind::Revoked
                } else {
                    ChangeKind::Unchanged
                }
            }
            PermissionOperation::Grant | PermissionOperation::GrantWithCondition => {
                let requested = match op.operation {
                    PermissionOperation::GrantWithCondition => {
                        PermissionFlag::Condition(op.condition.unwrap_or(Address::ZERO))
                    }
                    _ => PermissionFlag::Allow,
                };
                match current {
                    None => {
                        self.insert(op.where_, op.who, op.permission_id, requested);
                        ChangeKind::Granted
                    }
                    Some(flag) if flag == requested => ChangeKind::Unchanged,
                    Some(flag) => {
                        return Err(PermissionError::PermissionAlreadyGrantedForDifferentCondition {
                            where_: op.where_,
                            who: op.who,
                            permission_id: op.permission_id,
                            current: flag.condition(),
                            new: requested.condition(),
                        })
                    }
                }
            }
        };

        if kind != ChangeKind::Unchanged {
            debug!(
                kind = ?kind,
                where_ = %op.where_,
                who = %op.who,
                permission = ?op.permission_id,
                "Permission changed"
            );
        }

        Ok(PermissionChange {
            kind,
            where_: op.where_,
            who: op.who,
            permission_id: op.permission_id,
            condition: match kind {
                ChangeKind::Revoked => current.and_then(|f| f.condition()),
                _ => op.condition.filter(|_| op.operation == PermissionOperation::GrantWithCondition),
            },
        })
    }

    fn insert(&mut self, where_: Target, who: Target, permission_id: PermissionId, flag: PermissionFlag) {
        self.entries.insert(
            permission_hash(&where_, &who, &permission_id),
            PermissionEntry {
                where_,
                who,
                permission_id,
                flag,
            },
        );
    }

    /// All granted entries as `(where, who, permissionId, flag)`
    pub fn entries(&self) -> Vec<(Target, Target, PermissionId, PermissionFlag)> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .map(|e| (e.where_, e.who, e.permission_id, e.flag))
            .collect();
        entries.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{deploy_condition, PermissionCondition};
    use dp_core::AddressSpace;
    use std::sync::Arc;

    struct OnlyData(&'static [u8]);

    impl PermissionCondition for OnlyData {
        fn is_granted(&self, _: Address, _: Address, _: PermissionId, data: &[u8]) -> bool {
            data == self.0
        }
    }

    struct Fixture {
        manager: PermissionManager,
        dao: Address,
        root: Address,
        condition: Address,
        other_condition: Address,
    }

    fn fixture() -> Fixture {
        let space = Arc::new(AddressSpace::new());
        let condition = Address::derive("condition-a");
        let other_condition = Address::derive("condition-b");
        deploy_condition(&space, condition, Arc::new(OnlyData(b"ok"))).unwrap();
        deploy_condition(&space, other_condition, Arc::new(OnlyData(b"other"))).unwrap();

        let dao = Address::derive("dao");
        let root = Address::derive("root");
        Fixture {
            manager: PermissionManager::new(dao, root, PermissionDiffEngine::new(space)),
            dao,
            root,
            condition,
            other_condition,
        }
    }

    fn mint() -> PermissionId {
        PermissionId::named("MINT_PERMISSION")
    }

    #[test]
    fn test_initial_root_holder() {
        let f = fixture();
        assert!(f.manager.is_granted(f.dao, f.root, *ROOT_PERMISSION_ID, &[]));
        assert!(!f.manager.is_granted(f.dao, Address::derive("stranger"), *ROOT_PERMISSION_ID, &[]));
    }

    #[test]
    fn test_grant_requires_root() {
        let mut f = fixture();
        let stranger = Address::derive("stranger");
        let err = f.manager.grant(stranger, f.dao, stranger, mint()).unwrap_err();
        assert_eq!(
            err,
            PermissionError::Unauthorized {
                where_: f.dao,
                who: stranger,
                permission_id: *ROOT_PERMISSION_ID
            }
        );
    }

    #[test]
    fn test_grant_is_idempotent_and_revoke_removes() {
        let mut f = fixture();
        let who = Address::derive("minter");

        let first = f.manager.grant(f.root, f.dao, who, mint()).unwrap();
        let second = f.manager.grant(f.root, f.dao, who, mint()).unwrap();
        assert_eq!(first.kind, ChangeKind::Granted);
        assert_eq!(second.kind, ChangeKind::Unchanged);
        assert!(f.manager.is_granted(f.dao, who, mint(), &[]));

        let revoked = f.manager.revoke(f.root, f.dao, who, mint()).unwrap();
        assert_eq!(revoked.kind, ChangeKind::Revoked);
        assert!(!f.manager.is_granted(f.dao, who, mint(), &[]));

        let again = f.manager.revoke(f.root, f.dao, who, mint()).unwrap();
        assert_eq!(again.kind, ChangeKind::Unchanged);
    }

    #[test]
    fn test_regrant_with_different_condition_fails() {
        let mut f = fixture();
        let who = Address::derive("minter");

        f.manager
            .grant_with_condition(f.root, f.dao, who, mint(), f.condition)
            .unwrap();
        let same = f
            .manager
            .grant_with_condition(f.root, f.dao, who, mint(), f.condition)
            .unwrap();
        assert_eq!(same.kind, ChangeKind::Unchanged);

        let err = f
            .manager
            .grant_with_condition(f.root, f.dao, who, mint(), f.other_condition)
            .unwrap_err();
        assert_eq!(
            err,
            PermissionError::PermissionAlreadyGrantedForDifferentCondition {
                where_: Target::Address(f.dao),
                who: Target::Address(who),
                permission_id: mint(),
                current: Some(f.condition),
                new: Some(f.other_condition),
            }
        );

        let err = f.manager.grant(f.root, f.dao, who, mint()).unwrap_err();
        assert!(matches!(
            err,
            PermissionError::PermissionAlreadyGrantedForDifferentCondition { new: None, .. }
        ));

        // Explicit revoke first, then the new condition is accepted
        f.manager.revoke(f.root, f.dao, who, mint()).unwrap();
        f.manager
            .grant_with_condition(f.root, f.dao, who, mint(), f.other_condition)
            .unwrap();
    }

    #[test]
    fn test_conditional_grant_consults_condition() {
        let mut f = fixture();
        let who = Address::derive("minter");
        f.manager
            .grant_with_condition(f.root, f.dao, who, mint(), f.condition)
            .unwrap();

        assert!(f.manager.is_granted(f.dao, who, mint(), b"ok"));
        assert!(!f.manager.is_granted(f.dao, who, mint(), b"nope"));
    }

    #[test]
    fn test_wildcard_who_matches_every_caller() {
        let mut f = fixture();
        f.manager
            .grant_with_condition(f.root, f.dao, Target::Any, mint(), f.condition)
            .unwrap();

        assert!(f.manager.is_granted(f.dao, Address::derive("anyone"), mint(), b"ok"));
        assert!(!f.manager.is_granted(Address::derive("elsewhere"), Address::derive("anyone"), mint(), b"ok"));
    }

    #[test]
    fn test_multi_target_batch_is_atomic() {
        let mut f = fixture();
        let a = Address::derive("a");
        let batch = [
            MultiTargetPermission::grant(f.dao, a, mint()),
            MultiTargetPermission::grant_with_condition(f.dao, a, mint(), f.condition),
        ];

        let before = f.manager.len();
        let err = f.manager.apply_multi_target_permissions(f.root, &batch).unwrap_err();
        assert!(matches!(
            err,
            PermissionError::PermissionAlreadyGrantedForDifferentCondition { .. }
        ));
        assert_eq!(f.manager.len(), before);
        assert!(!f.manager.is_granted(f.dao, a, mint(), &[]));
    }

    #[test]
    fn test_single_target_rejects_conditional_grants() {
        let mut f = fixture();
        let items = [SingleTargetPermission {
            operation: PermissionOperation::GrantWithCondition,
            who: Target::Address(Address::derive("a")),
            permission_id: mint(),
        }];
        assert_eq!(
            f.manager
                .apply_single_target_permissions(f.root, f.dao, &items)
                .unwrap_err(),
            PermissionError::GrantWithConditionNotSupported
        );

        let items = [SingleTargetPermission::grant(Address::derive("a"), mint())];
        let changes = f
            .manager
            .apply_single_target_permissions(f.root, f.dao, &items)
            .unwrap();
        assert_eq!(changes[0].kind, ChangeKind::Granted);
    }
}
