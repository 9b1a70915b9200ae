//! Employee record, role and DTOs for create and update operations.

use serde::{Deserialize, Serialize};

/// Organisational role, kept apart from the free-text position title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Staff,
    DepartmentHead,
    DeputyManager,
    SubDepartmentHead,
}

impl Role {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::DepartmentHead => "department_head",
            Role::DeputyManager => "deputy_manager",
            Role::SubDepartmentHead => "sub_department_head",
        }
    }

    /// Parse the storage representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "staff" => Some(Role::Staff),
            "department_head" => Some(Role::DepartmentHead),
            "deputy_manager" => Some(Role::DeputyManager),
            "sub_department_head" => Some(Role::SubDepartmentHead),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Staff => "Employee",
            Role::DepartmentHead => "Department Head",
            Role::DeputyManager => "Deputy Manager",
            Role::SubDepartmentHead => "Sub-department Head",
        }
    }
}

/// Employee as seen by the org chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i32,
    pub employee_code: String,
    pub full_name: String,
    pub department_id: Option<i32>,
    pub sub_department_id: Option<i32>,
    pub role: Role,
    /// Job title shown on cards. Never consulted for role decisions.
    pub position: String,
    pub is_active: bool,
    pub version: i64,
}

impl Employee {
    /// Whether the employee belongs to the given department or sub-department.
    pub fn is_member_of(&self, department_id: i32) -> bool {
        self.department_id == Some(department_id) || self.sub_department_id == Some(department_id)
    }
}

/// DTO for creating an employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmployee {
    pub employee_code: String,
    pub full_name: String,
    pub department_id: Option<i32>,
    pub sub_department_id: Option<i32>,
    pub role: Role,
    pub position: String,
}

/// DTO for updating an employee.
///
/// `expected_version` turns the update into a compare-and-set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateEmployee {
    pub employee_code: Option<String>,
    pub full_name: Option<String>,
    pub department_id: Option<Option<i32>>,
    pub sub_department_id: Option<Option<i32>>,
    pub role: Option<Role>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
    pub expected_version: Option<i64>,
}

impl UpdateEmployee {
    /// Patch that puts every mutable field back to the given record.
    pub fn restore(before: &Employee) -> Self {
        Self {
            employee_code: Some(before.employee_code.clone()),
            full_name: Some(before.full_name.clone()),
            department_id: Some(before.department_id),
            sub_department_id: Some(before.sub_department_id),
            role: Some(before.role),
            position: Some(before.position.clone()),
            is_active: Some(before.is_active),
            expected_version: None,
        }
    }

    /// Apply the patch to a record in place.
    pub fn apply_to(&self, employee: &mut Employee) {
        if let Some(code) = &self.employee_code {
            employee.employee_code = code.clone();
        }
        if let Some(name) = &self.full_name {
            employee.full_name = name.clone();
        }
        if let Some(department_id) = self.department_id {
            employee.department_id = department_id;
        }
        if let Some(sub_department_id) = self.sub_department_id {
            employee.sub_department_id = sub_department_id;
        }
        if let Some(role) = self.role {
            employee.role = role;
        }
        if let Some(position) = &self.position {
            employee.position = position.clone();
        }
        if let Some(is_active) = self.is_active {
            employee.is_active = is_active;
        }
    }
}
