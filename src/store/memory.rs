//! In-process store used for demos and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use super::{CHANGE_CHANNEL_CAPACITY, ChangeEvent, DocumentStore, Snapshot};
use crate::error::{AppError, Result};
use crate::models::{
    CreateDepartment, CreateEmployee, Department, Employee, Role, UpdateDepartment, UpdateEmployee,
};

#[derive(Default)]
struct Tables {
    departments: BTreeMap<i32, Department>,
    employees: BTreeMap<i32, Employee>,
    next_department_id: i32,
    next_employee_id: i32,
    writes: usize,
    /// Countdown to an injected write failure.
    fail_in: Option<usize>,
}

impl Tables {
    /// Consume one slot of the failure countdown.
    fn check_injected_failure(&mut self) -> Result<()> {
        match self.fail_in {
            Some(1) => {
                self.fail_in = None;
                Err(AppError::store("injected write failure"))
            }
            Some(n) => {
                self.fail_in = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Store holding both collections in memory.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_tables(Tables {
            next_department_id: 1,
            next_employee_id: 1,
            ..Default::default()
        })
    }

    /// Create a store pre-filled with the given records.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let mut tables = Tables {
            next_department_id: 1,
            next_employee_id: 1,
            ..Default::default()
        };
        for dept in snapshot.departments {
            tables.next_department_id = tables.next_department_id.max(dept.id + 1);
            tables.departments.insert(dept.id, dept);
        }
        for emp in snapshot.employees {
            tables.next_employee_id = tables.next_employee_id.max(emp.id + 1);
            tables.employees.insert(emp.id, emp);
        }
        Self::from_tables(tables)
    }

    fn from_tables(tables: Tables) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            tables: Mutex::new(tables),
            changes,
        }
    }

    /// Small org used by `--demo`.
    pub fn sample() -> Self {
        let dept = |id, name: &str, parent_id, manager_id, display_order| Department {
            id,
            name: name.to_string(),
            manager_id,
            deputy_manager_id: None,
            parent_id,
            display_order,
            is_active: true,
            version: 1,
        };
        let emp = |id, code: &str, name: &str, department_id, sub_department_id, role, position: &str| Employee {
            id,
            employee_code: code.to_string(),
            full_name: name.to_string(),
            department_id: Some(department_id),
            sub_department_id,
            role,
            position: position.to_string(),
            is_active: true,
            version: 1,
        };

        Self::with_snapshot(Snapshot {
            departments: vec![
                dept(1, "Operations", None, Some(1), 1),
                dept(2, "Finance", None, Some(4), 2),
                dept(3, "Warehouse", Some(1), Some(3), 1),
                dept(4, "Human Resources", None, None, 3),
            ],
            employees: vec![
                emp(1, "E001", "Nguyen Van An", 1, None, Role::DepartmentHead, "Operations Director"),
                emp(2, "E002", "Tran Thi Binh", 1, None, Role::Staff, "Planner"),
                emp(3, "E003", "Le Van Cuong", 1, Some(3), Role::SubDepartmentHead, "Warehouse Lead"),
                emp(4, "E004", "Pham Thi Dung", 2, None, Role::DepartmentHead, "Chief Accountant"),
                emp(5, "E005", "Hoang Van Em", 2, None, Role::Staff, "Accountant"),
                emp(6, "E006", "Vo Thi Giang", 1, Some(3), Role::Staff, "Picker"),
            ],
        })
    }

    /// Make the `nth` write from now fail with a store error.
    pub async fn fail_nth_write(&self, nth: usize) {
        self.tables.lock().await.fail_in = Some(nth.max(1));
    }

    /// Number of writes applied so far.
    pub async fn write_count(&self) -> usize {
        self.tables.lock().await.writes
    }

    fn notify(&self, event: ChangeEvent) {
        // No subscribers is fine.
        let _ = self.changes.send(event);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_departments(&self) -> Result<Vec<Department>> {
        let tables = self.tables.lock().await;
        let mut departments: Vec<_> = tables.departments.values().cloned().collect();
        departments.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.name.cmp(&b.name)));
        Ok(departments)
    }

    async fn list_employees(&self) -> Result<Vec<Employee>> {
        let tables = self.tables.lock().await;
        let mut employees: Vec<_> = tables.employees.values().cloned().collect();
        employees.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(employees)
    }

    async fn get_department(&self, id: i32) -> Result<Option<Department>> {
        Ok(self.tables.lock().await.departments.get(&id).cloned())
    }

    async fn get_employee(&self, id: i32) -> Result<Option<Employee>> {
        Ok(self.tables.lock().await.employees.get(&id).cloned())
    }

    async fn create_department(&self, data: CreateDepartment) -> Result<Department> {
        let created = {
            let mut tables = self.tables.lock().await;
            tables.check_injected_failure()?;
            if tables.departments.values().any(|d| d.name == data.name) {
                return Err(AppError::validation(format!("Department '{}' already exists", data.name)));
            }
            let id = tables.next_department_id;
            tables.next_department_id += 1;
            let dept = Department {
                id,
                name: data.name,
                manager_id: None,
                deputy_manager_id: None,
                parent_id: data.parent_id,
                display_order: data.display_order,
                is_active: true,
                version: 1,
            };
            tables.departments.insert(id, dept.clone());
            tables.writes += 1;
            dept
        };
        self.notify(ChangeEvent::DepartmentChanged(created.id));
        Ok(created)
    }

    async fn create_employee(&self, data: CreateEmployee) -> Result<Employee> {
        let created = {
            let mut tables = self.tables.lock().await;
            tables.check_injected_failure()?;
            let id = tables.next_employee_id;
            tables.next_employee_id += 1;
            let emp = Employee {
                id,
                employee_code: data.employee_code,
                full_name: data.full_name,
                department_id: data.department_id,
                sub_department_id: data.sub_department_id,
                role: data.role,
                position: data.position,
                is_active: true,
                version: 1,
            };
            tables.employees.insert(id, emp.clone());
            tables.writes += 1;
            emp
        };
        self.notify(ChangeEvent::EmployeeChanged(created.id));
        Ok(created)
    }

    async fn update_department(&self, id: i32, data: UpdateDepartment) -> Result<Department> {
        let updated = {
            let mut tables = self.tables.lock().await;
            let current = tables
                .departments
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("department {id}")))?;

            if let Some(expected) = data.expected_version
                && current.version != expected
            {
                return Err(AppError::Conflict {
                    entity: "department",
                    id,
                    expected,
                    actual: current.version,
                });
            }

            let mut next = current.clone();
            data.apply_to(&mut next);
            if next == current {
                return Ok(current);
            }

            tables.check_injected_failure()?;
            next.version += 1;
            tables.departments.insert(id, next.clone());
            tables.writes += 1;
            next
        };
        self.notify(ChangeEvent::DepartmentChanged(id));
        Ok(updated)
    }

    async fn update_employee(&self, id: i32, data: UpdateEmployee) -> Result<Employee> {
        let updated = {
            let mut tables = self.tables.lock().await;
            let current = tables
                .employees
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("employee {id}")))?;

            if let Some(expected) = data.expected_version
                && current.version != expected
            {
                return Err(AppError::Conflict {
                    entity: "employee",
                    id,
                    expected,
                    actual: current.version,
                });
            }

            let mut next = current.clone();
            data.apply_to(&mut next);
            if next == current {
                return Ok(current);
            }

            tables.check_injected_failure()?;
            next.version += 1;
            tables.employees.insert(id, next.clone());
            tables.writes += 1;
            next
        };
        self.notify(ChangeEvent::EmployeeChanged(id));
        Ok(updated)
    }

    async fn delete_department(&self, id: i32) -> Result<bool> {
        let removed = {
            let mut tables = self.tables.lock().await;
            tables.check_injected_failure()?;
            let removed = tables.departments.remove(&id).is_some();
            if removed {
                tables.writes += 1;
            }
            removed
        };
        if removed {
            self.notify(ChangeEvent::DepartmentRemoved(id));
        }
        Ok(removed)
    }

    async fn delete_employee(&self, id: i32) -> Result<bool> {
        let removed = {
            let mut tables = self.tables.lock().await;
            tables.check_injected_failure()?;
            let removed = tables.employees.remove(&id).is_some();
            if removed {
                tables.writes += 1;
            }
            removed
        };
        if removed {
            self.notify(ChangeEvent::EmployeeRemoved(id));
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_update_is_not_a_write() {
        let store = MemoryStore::sample();
        let mut rx = store.subscribe();

        let dept = store
            .update_department(4, UpdateDepartment {
                manager_id: Some(None),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(dept.version, 1);
        assert_eq!(store.write_count().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_notifies() {
        let store = MemoryStore::sample();
        let mut rx = store.subscribe();

        let emp = store
            .update_employee(2, UpdateEmployee {
                position: Some("Senior Planner".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(emp.version, 2);
        assert_eq!(rx.try_recv().unwrap(), ChangeEvent::EmployeeChanged(2));
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = MemoryStore::sample();
        let err = store
            .update_department(1, UpdateDepartment {
                name: Some("Ops".to_string()),
                expected_version: Some(7),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict { id: 1, expected: 7, actual: 1, .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_hits_only_the_nth_write() {
        let store = MemoryStore::sample();
        store.fail_nth_write(2).await;

        let patch = |p: &str| UpdateEmployee {
            position: Some(p.to_string()),
            ..Default::default()
        };
        assert!(store.update_employee(2, patch("a")).await.is_ok());
        assert!(store.update_employee(2, patch("b")).await.is_err());
        assert!(store.update_employee(2, patch("c")).await.is_ok());
        assert_eq!(store.write_count().await, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_employee() {
        let store = MemoryStore::new();
        let err = store.update_employee(99, UpdateEmployee::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
