//! Record-level authorization
//!
//! A caller may act on a record if they own it or their role is privileged
//! for the operation. Private policies accept the owner only, whatever the
//! role. Denials are always a bare `Forbidden`.

use super::middleware::Caller;
use crate::audit::{audit_log, AuditEvent};
use crate::error::AppError;
use photoshare_core::{AccountId, OwnershipRepository, ResourceKind, Role, Store};

/// Who besides the owner may act on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipPolicy {
    pub privileged_roles: &'static [Role],
    /// Owner only, role is ignored
    pub private: bool,
}

impl OwnershipPolicy {
    pub const fn owner_or(privileged_roles: &'static [Role]) -> Self {
        Self {
            privileged_roles,
            private: false,
        }
    }

    pub const fn owner_only() -> Self {
        Self {
            privileged_roles: &[],
            private: true,
        }
    }
}

pub const READ_PHOTO: OwnershipPolicy = OwnershipPolicy::owner_or(&[Role::Admin, Role::Moderator]);
pub const UPDATE_PHOTO: OwnershipPolicy = OwnershipPolicy::owner_or(&[Role::Admin]);
pub const DELETE_PHOTO: OwnershipPolicy =
    OwnershipPolicy::owner_or(&[Role::Admin, Role::Moderator]);
pub const LIST_USER_PHOTOS: OwnershipPolicy =
    OwnershipPolicy::owner_or(&[Role::Admin, Role::Moderator]);
pub const UPDATE_COMMENT: OwnershipPolicy = OwnershipPolicy::owner_only();
pub const MODIFY_FILTER: OwnershipPolicy =
    OwnershipPolicy::owner_or(&[Role::Admin, Role::Moderator]);
pub const CREATE_TRANSFORMATION: OwnershipPolicy = OwnershipPolicy::owner_only();
pub const MANAGE_TRANSFORMATION: OwnershipPolicy = OwnershipPolicy::owner_or(&[Role::Admin]);

/// The allow rule
pub fn allows(
    owner_id: AccountId,
    caller_id: AccountId,
    caller_role: Role,
    privileged_roles: &[Role],
    private: bool,
) -> bool {
    if private {
        caller_id == owner_id
    } else {
        privileged_roles.contains(&caller_role) || caller_id == owner_id
    }
}

/// Apply `policy` to a record owned by `owner_id`
pub fn authorize_owner_or_role(
    owner_id: AccountId,
    caller: &Caller,
    policy: OwnershipPolicy,
) -> Result<(), AppError> {
    if allows(
        owner_id,
        caller.id(),
        caller.role(),
        policy.privileged_roles,
        policy.private,
    ) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Look up the owner of `kind`/`id` and apply `policy`
///
/// A missing record is `NotFound`; the rule only runs for records that exist.
pub async fn authorize_record(
    store: &dyn Store,
    kind: ResourceKind,
    id: i64,
    caller: &Caller,
    policy: OwnershipPolicy,
) -> Result<AccountId, AppError> {
    let owner_id = store
        .owner_of(kind, id)
        .await?
        .ok_or_else(AppError::not_found)?;

    authorize_owner_or_role(owner_id, caller, policy).map_err(|err| {
        audit_log(&AuditEvent::AccessDenied {
            user_id: Some(caller.id()),
            email: Some(caller.email().to_string()),
            resource: format!("{kind}:{id}"),
            required_role: None,
            ip_address: None,
            user_agent: None,
        });
        err
    })?;

    Ok(owner_id)
}
