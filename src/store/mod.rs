//! Data provider for employees and departments.
//!
//! The org chart only ever talks to a [`DocumentStore`]: full reads, point
//! reads, field-level updates and a change subscription. Two backends ship
//! with the crate, [`PgStore`] for PostgreSQL and [`MemoryStore`] for demos
//! and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::{CreateDepartment, CreateEmployee, Department, Employee, UpdateDepartment, UpdateEmployee};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Capacity of the change broadcast channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Notification pushed to subscribers after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ChangeEvent {
    EmployeeChanged(i32),
    EmployeeRemoved(i32),
    DepartmentChanged(i32),
    DepartmentRemoved(i32),
}

/// Both collections read together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub departments: Vec<Department>,
    pub employees: Vec<Employee>,
}

impl Snapshot {
    /// Look up a department by id.
    pub fn department(&self, id: i32) -> Option<&Department> {
        self.departments.iter().find(|d| d.id == id)
    }

    /// Look up an employee by id.
    pub fn employee(&self, id: i32) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    /// Employees belonging to a department or sub-department.
    pub fn members(&self, department_id: i32) -> impl Iterator<Item = &Employee> {
        self.employees.iter().filter(move |e| e.is_member_of(department_id))
    }
}

/// Remote collections the org chart reads and writes.
///
/// Updates fail with [`AppError::NotFound`](crate::AppError::NotFound) for
/// unknown ids and [`AppError::Conflict`](crate::AppError::Conflict) when
/// `expected_version` does not match. A patch that changes nothing is not a
/// write: it returns the stored record and emits no event.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_departments(&self) -> Result<Vec<Department>>;

    async fn list_employees(&self) -> Result<Vec<Employee>>;

    async fn get_department(&self, id: i32) -> Result<Option<Department>>;

    async fn get_employee(&self, id: i32) -> Result<Option<Employee>>;

    async fn create_department(&self, data: CreateDepartment) -> Result<Department>;

    async fn create_employee(&self, data: CreateEmployee) -> Result<Employee>;

    async fn update_department(&self, id: i32, data: UpdateDepartment) -> Result<Department>;

    async fn update_employee(&self, id: i32, data: UpdateEmployee) -> Result<Employee>;

    async fn delete_department(&self, id: i32) -> Result<bool>;

    async fn delete_employee(&self, id: i32) -> Result<bool>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Read both collections.
    async fn snapshot(&self) -> Result<Snapshot> {
        let departments = self.list_departments().await?;
        let employees = self.list_employees().await?;
        Ok(Snapshot { departments, employees })
    }
}
