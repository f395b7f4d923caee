//! Permission errors

use dp_core::Address;
use thiserror::Error;

use crate::permission::{PermissionId, PermissionOperation, Target};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Unauthorized: {who} lacks {permission_id:?} on {where_}")]
    Unauthorized {
        where_: Address,
        who: Address,
        permission_id: PermissionId,
    },

    #[error("Permission cannot target the any-address for both where and who")]
    AnyAddressDisallowedForWhoAndWhere,

    #[error("Permission {permission_id:?} cannot be granted to or on the any-address")]
    PermissionsForAnyAddressDisallowed { permission_id: PermissionId },

    #[error("Condition {0} is not a contract")]
    ConditionNotAContract(Address),

    #[error("Condition {0} does not support the permission condition interface")]
    ConditionInterfaceNotSupported(Address),

    #[error("Conditional grants are not supported here")]
    GrantWithConditionNotSupported,

    #[error("Operation {operation} is not allowed here")]
    OperationNotAllowed { operation: PermissionOperation },

    #[error(
        "Permission {permission_id:?} where={where_} who={who} already granted with condition {current:?}, refusing {new:?}"
    )]
    PermissionAlreadyGrantedForDifferentCondition {
        where_: Target,
        who: Target,
        permission_id: PermissionId,
        /// `None` for an unconditional grant
        current: Option<Address>,
        new: Option<Address>,
    },
}

pub type Result<T> = std::result::Result<T, PermissionError>;
