//! Drop handling and department edits against a live store.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use super::drag::DropRequest;
use super::locks::DepartmentLocks;
use super::sequencer::{self, DepartmentEdit, EditReport, MovePlan, MoveReport, Succession};
use super::succession::{SuccessionChoice, SuccessionDialog, SuccessionPrompt};
use super::tree::{self, Container};
use crate::error::{AppError, Result};
use crate::store::{DocumentStore, Snapshot};

/// Where a reassignment is after the drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReassignPhase {
    #[default]
    Idle,
    EvaluatingManagerStatus { employee_id: i32 },
    AwaitingSuccession { employee_id: i32, department_id: i32 },
    Moving { employee_id: i32 },
}

/// Why a drop changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    SameContainer,
    InvalidTarget,
}

/// Result of handling a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Unchanged(NoOpReason),
    Cancelled,
    Moved(MoveReport),
}

/// Runs reassignments and department edits.
pub struct Reassigner<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    locks: DepartmentLocks,
    phase: watch::Sender<ReassignPhase>,
}

impl<S: DocumentStore + ?Sized> Reassigner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_locks(store, DepartmentLocks::new())
    }

    /// Share department locks with other writers, such as the reconciler.
    pub fn with_locks(store: Arc<S>, locks: DepartmentLocks) -> Self {
        Self {
            store,
            locks,
            phase: watch::Sender::new(ReassignPhase::Idle),
        }
    }

    pub fn locks(&self) -> &DepartmentLocks {
        &self.locks
    }

    /// Follow phase changes.
    pub fn phase(&self) -> watch::Receiver<ReassignPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: ReassignPhase) {
        self.phase.send_replace(phase);
    }

    /// Handle an employee card dropped on a zone.
    ///
    /// Asks `dialog` for a replacement for every department the employee
    /// leads and would leave. Nothing is written before every answer is in.
    pub async fn handle_drop<D: SuccessionDialog + ?Sized>(&self, drop: DropRequest, dialog: &D) -> Result<DropOutcome> {
        let result = self.run_drop(drop, dialog).await;
        self.set_phase(ReassignPhase::Idle);

        match &result {
            Ok(DropOutcome::Moved(report)) => info!(
                "Moved employee {} to department {} ({} writes)",
                report.employee_id,
                report.to.zone_id(),
                report.writes
            ),
            Ok(DropOutcome::Cancelled) => info!("Move of employee {} cancelled", drop.employee_id),
            Ok(DropOutcome::Unchanged(reason)) => info!("Drop of employee {} ignored: {:?}", drop.employee_id, reason),
            Err(e) => error!("Failed to move employee {}: {}", drop.employee_id, e),
        }
        result
    }

    async fn run_drop<D: SuccessionDialog + ?Sized>(&self, drop: DropRequest, dialog: &D) -> Result<DropOutcome> {
        let employee_id = drop.employee_id;
        self.set_phase(ReassignPhase::EvaluatingManagerStatus { employee_id });

        let snapshot = self.store.snapshot().await?;
        let employee = snapshot
            .employee(employee_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;

        let Some(to) = tree::resolve_drop_zone(&snapshot.departments, drop.zone_id) else {
            return Ok(DropOutcome::Unchanged(NoOpReason::InvalidTarget));
        };
        let from = Container::of(&employee);
        if from == Some(to) {
            return Ok(DropOutcome::Unchanged(NoOpReason::SameContainer));
        }

        let vacated = sequencer::vacated_departments(&snapshot, &employee, &to);
        let mut choices = Vec::with_capacity(vacated.len());
        for department in &vacated {
            self.set_phase(ReassignPhase::AwaitingSuccession {
                employee_id,
                department_id: department.id,
            });
            let prompt = SuccessionPrompt::new(&snapshot, department, &employee);
            let Some(choice) = dialog.choose_successor(prompt.clone()).await else {
                return Ok(DropOutcome::Cancelled);
            };
            prompt.validate(choice)?;
            choices.push((department.id, choice));
        }

        self.set_phase(ReassignPhase::Moving { employee_id });

        let mut involved: BTreeSet<i32> = vacated.iter().map(|d| d.id).collect();
        involved.extend([to.department_id, to.zone_id()]);
        if let Some(from) = from {
            involved.extend([from.department_id, from.zone_id()]);
        }
        involved.extend(
            snapshot
                .departments
                .iter()
                .filter(|d| d.manager_id == Some(employee_id) || d.deputy_manager_id == Some(employee_id))
                .map(|d| d.id),
        );
        let _guards = self.locks.acquire(involved).await;

        // Decisions were made on `snapshot`; re-read and make sure they
        // still hold before writing.
        let fresh = self.store.snapshot().await?;
        let plan = revalidate(&snapshot, &fresh, employee_id, to, &choices)?;
        let report = sequencer::execute_move(self.store.as_ref(), &fresh, &plan).await?;
        Ok(DropOutcome::Moved(report))
    }

    /// Save the department edit form.
    pub async fn edit_department(&self, department_id: i32, edit: &DepartmentEdit) -> Result<EditReport> {
        let snapshot = self.store.snapshot().await?;

        let mut involved = BTreeSet::from([department_id]);
        if let Some(manager) = edit.manager_id.and_then(|id| snapshot.employee(id)) {
            involved.extend(manager.department_id);
            involved.extend(manager.sub_department_id);
        }
        let _guards = self.locks.acquire(involved).await;

        let fresh = self.store.snapshot().await?;
        let result = sequencer::apply_department_edit(self.store.as_ref(), &fresh, department_id, edit).await;
        match &result {
            Ok(report) => info!(
                "Saved department {} ({} writes, {} demoted)",
                report.department.name,
                report.writes,
                report.demoted.len()
            ),
            Err(e) => error!("Failed to save department {}: {}", department_id, e),
        }
        result
    }
}

/// Rebuild the move plan from fresh records, failing if anything the user
/// decided on has changed underneath.
fn revalidate(
    seen: &Snapshot,
    fresh: &Snapshot,
    employee_id: i32,
    to: Container,
    choices: &[(i32, SuccessionChoice)],
) -> Result<MovePlan> {
    let employee = fresh
        .employee(employee_id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;
    if let Some(before) = seen.employee(employee_id)
        && before.version != employee.version
    {
        return Err(AppError::Conflict {
            entity: "employee",
            id: employee_id,
            expected: before.version,
            actual: employee.version,
        });
    }

    if tree::resolve_drop_zone(&fresh.departments, to.zone_id()) != Some(to) {
        return Err(AppError::validation("The target department is no longer available"));
    }

    let vacated = sequencer::vacated_departments(fresh, &employee, &to);
    if vacated.len() != choices.len() || vacated.iter().zip(choices).any(|(d, (id, _))| d.id != *id) {
        return Err(AppError::validation("Department leadership changed while moving; try again"));
    }

    let mut successions = Vec::with_capacity(choices.len());
    for (department, (_, choice)) in vacated.into_iter().zip(choices) {
        if let Some(before) = seen.department(department.id)
            && before.version != department.version
        {
            return Err(AppError::Conflict {
                entity: "department",
                id: department.id,
                expected: before.version,
                actual: department.version,
            });
        }

        let prompt = SuccessionPrompt::new(fresh, &department, &employee);
        prompt.validate(*choice)?;
        let replacement = match choice {
            SuccessionChoice::Replace(id) => prompt.candidates.iter().find(|c| c.id == *id).cloned(),
            SuccessionChoice::LeaveVacant => None,
        };
        successions.push(Succession { department, replacement });
    }

    Ok(MovePlan {
        from: Container::of(&employee),
        employee,
        to,
        successions,
    })
}
