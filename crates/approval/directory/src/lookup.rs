//! The read-side directory contract.
//!
//! User/role/department management lives in an external directory
//! service; the approval platform only ever asks narrow questions of it.

use approval_types::{ApprovalResult, Department, DepartmentId, Role, RoleId, User, UserId};
use async_trait::async_trait;

/// Narrow lookup interface over the external directory
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Get one user by id
    async fn find_user(&self, id: &UserId) -> ApprovalResult<Option<User>>;

    /// Get one role by id
    async fn find_role(&self, id: &RoleId) -> ApprovalResult<Option<Role>>;

    /// Get one department by id
    async fn find_department(&self, id: &DepartmentId) -> ApprovalResult<Option<Department>>;

    /// All users holding a role, optionally scoped to one department.
    ///
    /// No activity filtering happens here; the resolver applies its own
    /// candidate rules.
    async fn find_users_by_role_and_department(
        &self,
        role_id: &RoleId,
        department_id: Option<&DepartmentId>,
    ) -> ApprovalResult<Vec<User>>;

    /// The designated manager of a department, if one is assigned
    async fn find_department_manager(
        &self,
        department_id: &DepartmentId,
    ) -> ApprovalResult<Option<User>>;
}
