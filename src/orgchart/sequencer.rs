//! Ordered writes for reassignments and department edits.
//!
//! Every sequence runs through a [`Journal`]; a failure part-way undoes the
//! writes already applied.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::journal::Journal;
use super::tree::{self, Container};
use crate::error::{AppError, Result};
use crate::models::{Department, Employee, Role, UpdateDepartment, UpdateEmployee};
use crate::store::{DocumentStore, Snapshot};

/// Replacement decision for a department the moved employee leads.
#[derive(Debug, Clone)]
pub struct Succession {
    pub department: Department,
    /// `None` leaves the department without a manager.
    pub replacement: Option<Employee>,
}

/// Fully resolved reassignment.
#[derive(Debug, Clone)]
pub struct MovePlan {
    pub employee: Employee,
    pub from: Option<Container>,
    pub to: Container,
    pub successions: Vec<Succession>,
}

/// What a completed move changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub employee_id: i32,
    pub from: Option<Container>,
    pub to: Container,
    /// `(department_id, new manager)` per succession.
    pub successors: Vec<(i32, Option<i32>)>,
    pub writes: usize,
}

/// Departments the employee manages but would no longer belong to.
pub fn vacated_departments(snapshot: &Snapshot, employee: &Employee, to: &Container) -> Vec<Department> {
    snapshot
        .departments
        .iter()
        .filter(|d| d.manager_id == Some(employee.id) && !to.contains(d.id))
        .cloned()
        .collect()
}

/// Role implied by the manager and deputy references that point at the
/// employee from departments they belong to.
fn derived_role<'a>(employee_id: i32, container: &Container, departments: impl Iterator<Item = &'a Department>) -> Role {
    let mut role = Role::Staff;
    for dept in departments.filter(|d| container.contains(d.id)) {
        if dept.manager_id == Some(employee_id) {
            match dept.head_role() {
                Role::DepartmentHead => return Role::DepartmentHead,
                head => role = head,
            }
        } else if dept.deputy_manager_id == Some(employee_id) && role == Role::Staff {
            role = Role::DeputyManager;
        }
    }
    role
}

/// Clear manager/deputy references to an employee from departments outside
/// their container.
async fn clear_stale_references<S: DocumentStore + ?Sized>(
    journal: &mut Journal<'_, S>,
    departments: &mut BTreeMap<i32, Department>,
    employee_id: i32,
    container: &Container,
) -> Result<()> {
    let stale: Vec<Department> = departments
        .values()
        .filter(|d| !container.contains(d.id))
        .filter(|d| d.manager_id == Some(employee_id) || d.deputy_manager_id == Some(employee_id))
        .cloned()
        .collect();

    for dept in stale {
        let mut patch = UpdateDepartment {
            expected_version: Some(dept.version),
            ..Default::default()
        };
        if dept.manager_id == Some(employee_id) {
            patch.manager_id = Some(None);
        }
        if dept.deputy_manager_id == Some(employee_id) {
            patch.deputy_manager_id = Some(None);
        }
        debug!("Clearing stale references to employee {} on department {}", employee_id, dept.id);
        let updated = journal.update_department(&dept, patch).await?;
        departments.insert(updated.id, updated);
    }
    Ok(())
}

/// Execute a move plan: successions first, then the move itself, then
/// stale references.
pub async fn execute_move<S: DocumentStore + ?Sized>(store: &S, snapshot: &Snapshot, plan: &MovePlan) -> Result<MoveReport> {
    let mut journal = Journal::new(store);
    let result = apply_move(&mut journal, snapshot, plan).await;
    let writes = journal.writes();

    let successors = journal.settle(result).await?;
    Ok(MoveReport {
        employee_id: plan.employee.id,
        from: plan.from,
        to: plan.to,
        successors,
        writes,
    })
}

async fn apply_move<S: DocumentStore + ?Sized>(
    journal: &mut Journal<'_, S>,
    snapshot: &Snapshot,
    plan: &MovePlan,
) -> Result<Vec<(i32, Option<i32>)>> {
    let mut departments: BTreeMap<i32, Department> = snapshot.departments.iter().map(|d| (d.id, d.clone())).collect();
    let mut employees: BTreeMap<i32, Employee> = snapshot.employees.iter().map(|e| (e.id, e.clone())).collect();
    let employee = &plan.employee;
    let mut successors = Vec::with_capacity(plan.successions.len());

    for succession in &plan.successions {
        let dept = &succession.department;
        let replacement_id = succession.replacement.as_ref().map(|r| r.id);

        let mut patch = UpdateDepartment {
            manager_id: Some(replacement_id),
            expected_version: Some(dept.version),
            ..Default::default()
        };
        if replacement_id.is_some() && dept.deputy_manager_id == replacement_id {
            patch.deputy_manager_id = Some(None);
        }
        let updated = journal.update_department(dept, patch).await?;
        let name = updated.name.clone();
        departments.insert(updated.id, updated);

        // The same person may take over several departments; promote from
        // the latest record and keep the highest role they now hold.
        if let Some(id) = replacement_id {
            let replacement = employees
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("employee {id}")))?;
            let role = match Container::of(&replacement) {
                Some(container) => derived_role(id, &container, departments.values()),
                None => departments.get(&dept.id).map_or(Role::DepartmentHead, Department::head_role),
            };
            let after = journal
                .update_employee(&replacement, UpdateEmployee {
                    role: Some(role),
                    expected_version: Some(replacement.version),
                    ..Default::default()
                })
                .await?;
            info!("{} now leads {}", after.full_name, name);
            employees.insert(after.id, after);
        } else {
            info!("{} left without a manager", name);
        }

        successors.push((dept.id, replacement_id));
    }

    let role = derived_role(employee.id, &plan.to, departments.values());
    let moved = journal
        .update_employee(employee, UpdateEmployee {
            department_id: Some(Some(plan.to.department_id)),
            sub_department_id: Some(plan.to.sub_department_id),
            role: Some(role),
            expected_version: Some(employee.version),
            ..Default::default()
        })
        .await?;

    clear_stale_references(journal, &mut departments, moved.id, &plan.to).await?;
    Ok(successors)
}

/// Values submitted from the department edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentEdit {
    pub name: String,
    pub parent_id: Option<i32>,
    pub display_order: i32,
    pub is_active: bool,
    pub manager_id: Option<i32>,
    pub deputy_manager_id: Option<i32>,
}

impl DepartmentEdit {
    /// Form pre-filled from an existing department.
    pub fn from_department(department: &Department) -> Self {
        Self {
            name: department.name.clone(),
            parent_id: department.parent_id,
            display_order: department.display_order,
            is_active: department.is_active,
            manager_id: department.manager_id,
            deputy_manager_id: department.deputy_manager_id,
        }
    }
}

/// What a department edit changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditReport {
    pub department: Department,
    pub promoted: Option<i32>,
    pub demoted: Vec<i32>,
    pub writes: usize,
}

/// Check the form against the current org chart.
pub fn validate_edit(snapshot: &Snapshot, department: &Department, edit: &DepartmentEdit) -> Result<()> {
    let name = edit.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Department name cannot be empty"));
    }
    if snapshot.departments.iter().any(|d| d.id != department.id && d.name == name) {
        return Err(AppError::validation(format!("Department '{name}' already exists")));
    }

    if let Some(parent_id) = edit.parent_id {
        if snapshot.department(parent_id).is_none() {
            return Err(AppError::validation(format!("Parent department {parent_id} does not exist")));
        }
        if tree::is_within(&snapshot.departments, department.id, parent_id) {
            return Err(AppError::validation("A department cannot be nested under itself"));
        }
    }

    if let Some(manager_id) = edit.manager_id {
        let manager = snapshot
            .employee(manager_id)
            .ok_or_else(|| AppError::validation(format!("Employee {manager_id} does not exist")))?;
        if !manager.is_active {
            return Err(AppError::validation(format!("{} is not active", manager.full_name)));
        }
    }

    if let Some(deputy_id) = edit.deputy_manager_id {
        if edit.manager_id == Some(deputy_id) {
            return Err(AppError::validation("Manager and deputy must be different people"));
        }
        let deputy = snapshot
            .employee(deputy_id)
            .ok_or_else(|| AppError::validation(format!("Employee {deputy_id} does not exist")))?;
        if !deputy.is_active || !deputy.is_member_of(department.id) {
            return Err(AppError::validation(format!(
                "{} must be an active member of {}",
                deputy.full_name, department.name
            )));
        }
    }
    Ok(())
}

/// Save the department edit form.
///
/// Order: department record, chosen manager (moved in and promoted), other
/// heads of the department demoted, deputy roles adjusted.
pub async fn apply_department_edit<S: DocumentStore + ?Sized>(
    store: &S,
    snapshot: &Snapshot,
    department_id: i32,
    edit: &DepartmentEdit,
) -> Result<EditReport> {
    let department = snapshot
        .department(department_id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("department {department_id}")))?;
    validate_edit(snapshot, &department, edit)?;

    let mut journal = Journal::new(store);
    let result = apply_edit(&mut journal, snapshot, &department, edit).await;
    let writes = journal.writes();

    let mut report = journal.settle(result).await?;
    report.writes = writes;
    Ok(report)
}

async fn apply_edit<S: DocumentStore + ?Sized>(
    journal: &mut Journal<'_, S>,
    snapshot: &Snapshot,
    department: &Department,
    edit: &DepartmentEdit,
) -> Result<EditReport> {
    let updated = journal
        .update_department(department, UpdateDepartment {
            name: Some(edit.name.trim().to_string()),
            manager_id: Some(edit.manager_id),
            deputy_manager_id: Some(edit.deputy_manager_id),
            parent_id: Some(edit.parent_id),
            display_order: Some(edit.display_order),
            is_active: Some(edit.is_active),
            expected_version: Some(department.version),
        })
        .await?;
    let head_role = updated.head_role();

    let mut departments: BTreeMap<i32, Department> = snapshot.departments.iter().map(|d| (d.id, d.clone())).collect();
    departments.insert(updated.id, updated.clone());
    let mut employees: BTreeMap<i32, Employee> = snapshot.employees.iter().map(|e| (e.id, e.clone())).collect();

    let mut promoted = None;
    if let Some(manager_id) = edit.manager_id {
        let manager = employees
            .get(&manager_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("employee {manager_id}")))?;

        let listing: Vec<Department> = departments.values().cloned().collect();
        let container = Container::of(&manager)
            .filter(|_| manager.is_member_of(updated.id))
            .or_else(|| tree::container_for(&listing, updated.id))
            .ok_or_else(|| AppError::validation(format!("{} has no place in the org chart", updated.name)))?;

        let after = journal
            .update_employee(&manager, UpdateEmployee {
                department_id: Some(Some(container.department_id)),
                sub_department_id: Some(container.sub_department_id),
                role: Some(head_role),
                expected_version: Some(manager.version),
                ..Default::default()
            })
            .await?;
        info!("{} assigned as {} of {}", after.full_name, head_role.label(), updated.name);

        clear_stale_references(journal, &mut departments, after.id, &container).await?;
        promoted = Some(after.id);
        employees.insert(after.id, after);
    }

    let others: Vec<Employee> = employees
        .values()
        .filter(|e| e.is_member_of(updated.id) && e.role == head_role && Some(e.id) != edit.manager_id)
        .cloned()
        .collect();
    let mut demoted = Vec::with_capacity(others.len());
    for other in others {
        let role = if edit.deputy_manager_id == Some(other.id) {
            Role::DeputyManager
        } else {
            Role::Staff
        };
        let after = journal
            .update_employee(&other, UpdateEmployee {
                role: Some(role),
                expected_version: Some(other.version),
                ..Default::default()
            })
            .await?;
        info!("{} is no longer {} of {}", after.full_name, head_role.label(), updated.name);
        demoted.push(after.id);
        employees.insert(after.id, after);
    }

    if let Some(deputy_id) = edit.deputy_manager_id
        && let Some(deputy) = employees.get(&deputy_id).cloned()
        && deputy.role == Role::Staff
    {
        let after = journal
            .update_employee(&deputy, UpdateEmployee {
                role: Some(Role::DeputyManager),
                expected_version: Some(deputy.version),
                ..Default::default()
            })
            .await?;
        employees.insert(after.id, after);
    }

    if let Some(old_deputy) = department.deputy_manager_id
        && edit.deputy_manager_id != Some(old_deputy)
        && edit.manager_id != Some(old_deputy)
        && !departments.values().any(|d| d.deputy_manager_id == Some(old_deputy))
        && let Some(previous) = employees.get(&old_deputy).cloned()
        && previous.role == Role::DeputyManager
    {
        let after = journal
            .update_employee(&previous, UpdateEmployee {
                role: Some(Role::Staff),
                expected_version: Some(previous.version),
                ..Default::default()
            })
            .await?;
        employees.insert(after.id, after);
    }

    let department = departments.remove(&updated.id).unwrap_or(updated);
    Ok(EditReport {
        department,
        promoted,
        demoted,
        writes: 0,
    })
}
