//! In-memory directory adapter.
//!
//! Deterministic and test-friendly; production deployments wire the
//! lookup trait to the real directory service instead.

use crate::DirectoryLookup;
use approval_types::{
    ApprovalError, ApprovalResult, Department, DepartmentId, Role, RoleId, User, UserId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory directory of users, roles, and departments
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, User>>,
    roles: RwLock<HashMap<RoleId, Role>>,
    departments: RwLock<HashMap<DepartmentId, Department>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        if let Ok(mut guard) = self.users.write() {
            guard.insert(user.id.clone(), user);
        }
    }

    pub fn add_role(&self, role: Role) {
        if let Ok(mut guard) = self.roles.write() {
            guard.insert(role.id.clone(), role);
        }
    }

    pub fn add_department(&self, department: Department) {
        if let Ok(mut guard) = self.departments.write() {
            guard.insert(department.id.clone(), department);
        }
    }
}

#[async_trait]
impl DirectoryLookup for InMemoryDirectory {
    async fn find_user(&self, id: &UserId) -> ApprovalResult<Option<User>> {
        let guard = self
            .users
            .read()
            .map_err(|_| ApprovalError::Storage("directory users lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn find_role(&self, id: &RoleId) -> ApprovalResult<Option<Role>> {
        let guard = self
            .roles
            .read()
            .map_err(|_| ApprovalError::Storage("directory roles lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn find_department(&self, id: &DepartmentId) -> ApprovalResult<Option<Department>> {
        let guard = self.departments.read().map_err(|_| {
            ApprovalError::Storage("directory departments lock poisoned".to_string())
        })?;
        Ok(guard.get(id).cloned())
    }

    async fn find_users_by_role_and_department(
        &self,
        role_id: &RoleId,
        department_id: Option<&DepartmentId>,
    ) -> ApprovalResult<Vec<User>> {
        let guard = self
            .users
            .read()
            .map_err(|_| ApprovalError::Storage("directory users lock poisoned".to_string()))?;
        let mut users: Vec<User> = guard
            .values()
            .filter(|u| &u.role_id == role_id)
            .filter(|u| match department_id {
                Some(dept) => u.department_id.as_ref() == Some(dept),
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn find_department_manager(
        &self,
        department_id: &DepartmentId,
    ) -> ApprovalResult<Option<User>> {
        let manager_id = {
            let guard = self.departments.read().map_err(|_| {
                ApprovalError::Storage("directory departments lock poisoned".to_string())
            })?;
            match guard.get(department_id) {
                Some(dept) => dept.manager_id.clone(),
                None => return Ok(None),
            }
        };
        match manager_id {
            Some(id) => self.find_user(&id).await,
            None => Ok(None),
        }
    }
}
