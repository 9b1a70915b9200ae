//! Department record and DTOs for create and update operations.

use serde::{Deserialize, Serialize};

use super::employee::Role;

/// Department or sub-department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: i32,
    pub name: String,
    pub manager_id: Option<i32>,
    pub deputy_manager_id: Option<i32>,
    pub parent_id: Option<i32>,
    pub display_order: i32,
    pub is_active: bool,
    pub version: i64,
}

impl Department {
    /// True for departments nested under another one.
    pub fn is_sub_department(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Role held by whoever manages this department.
    pub fn head_role(&self) -> Role {
        if self.is_sub_department() {
            Role::SubDepartmentHead
        } else {
            Role::DepartmentHead
        }
    }
}

/// DTO for creating a department.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDepartment {
    pub name: String,
    pub parent_id: Option<i32>,
    pub display_order: i32,
}

/// DTO for updating a department.
///
/// `expected_version` turns the update into a compare-and-set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDepartment {
    pub name: Option<String>,
    pub manager_id: Option<Option<i32>>,
    pub deputy_manager_id: Option<Option<i32>>,
    pub parent_id: Option<Option<i32>>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
    pub expected_version: Option<i64>,
}

impl UpdateDepartment {
    /// Patch that puts every mutable field back to the given record.
    pub fn restore(before: &Department) -> Self {
        Self {
            name: Some(before.name.clone()),
            manager_id: Some(before.manager_id),
            deputy_manager_id: Some(before.deputy_manager_id),
            parent_id: Some(before.parent_id),
            display_order: Some(before.display_order),
            is_active: Some(before.is_active),
            expected_version: None,
        }
    }

    /// Apply the patch to a record in place.
    pub fn apply_to(&self, department: &mut Department) {
        if let Some(name) = &self.name {
            department.name = name.clone();
        }
        if let Some(manager_id) = self.manager_id {
            department.manager_id = manager_id;
        }
        if let Some(deputy_manager_id) = self.deputy_manager_id {
            department.deputy_manager_id = deputy_manager_id;
        }
        if let Some(parent_id) = self.parent_id {
            department.parent_id = parent_id;
        }
        if let Some(display_order) = self.display_order {
            department.display_order = display_order;
        }
        if let Some(is_active) = self.is_active {
            department.is_active = is_active;
        }
    }
}
