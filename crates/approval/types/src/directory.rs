//! Directory DTOs: users, roles, and departments.
//!
//! Directory management (CRUD, RBAC assignment, authentication) is an
//! external collaborator. These types are the narrow read-side contract
//! the resolver and engine depend on.

use crate::{DepartmentId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// A user as seen by the approval platform
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role_id: RoleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<DepartmentId>,
    /// Inactive users never qualify as approvers
    pub active: bool,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role_id: RoleId,
    ) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            email: email.into(),
            role_id,
            department_id: None,
            active: true,
        }
    }

    pub fn in_department(mut self, department_id: DepartmentId) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A role in the directory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Department-head roles require a department scope with a
    /// designated manager on any workflow step that binds them
    pub department_head: bool,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(id),
            name: name.into(),
            department_head: false,
        }
    }

    pub fn department_head(mut self) -> Self {
        self.department_head = true;
        self
    }
}

/// A department in the directory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<UserId>,
}

impl Department {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: DepartmentId::new(id),
            name: name.into(),
            manager_id: None,
        }
    }

    pub fn with_manager(mut self, manager_id: UserId) -> Self {
        self.manager_id = Some(manager_id);
        self
    }
}
