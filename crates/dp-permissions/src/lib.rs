//! dp-permissions: Permission diffs and the permission manager
//!
//! Features:
//! - Grant / revoke / conditional-grant operations on `(where, who, permissionId)`
//! - Explicit `Any` wildcard target instead of a magic address
//! - Condition contracts resolved through the shared address space
//! - Validation of setup-produced permission batches before they are applied
//! - Atomic batch application with a change report

pub mod condition;
pub mod engine;
pub mod error;
pub mod manager;
pub mod permission;

pub use condition::{deploy_condition, ConditionContract, PermissionCondition, PERMISSION_CONDITION_INTERFACE_ID};
pub use engine::{hash_permissions, OperationScope, PermissionDiffEngine};
pub use error::{PermissionError, Result};
pub use manager::{ChangeKind, PermissionChange, PermissionFlag, PermissionManager};
pub use permission::{
    MultiTargetPermission, PermissionId, PermissionOp, PermissionOperation, SingleTargetPermission,
    Target, EXECUTE_PERMISSION_ID, ROOT_PERMISSION_ID,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::condition::{deploy_condition, PermissionCondition};
    pub use super::engine::{hash_permissions, OperationScope, PermissionDiffEngine};
    pub use super::error::PermissionError;
    pub use super::manager::{PermissionChange, PermissionManager};
    pub use super::permission::{
        MultiTargetPermission, PermissionId, PermissionOperation, SingleTargetPermission, Target,
        ROOT_PERMISSION_ID,
    };
}
