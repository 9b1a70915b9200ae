//! Consistency sweep for manager references.
//!
//! A department's `manager_id` must point at one of its own members. The
//! sweep clears manager and deputy on every department where it does not,
//! and clears a deputy who is no longer a member. Only departments that are
//! actually invalid are written, so running it on every change converges.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::locks::DepartmentLocks;
use crate::error::{AppError, Result};
use crate::models::{Department, UpdateDepartment};
use crate::store::{DocumentStore, Snapshot};

/// One department to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepAction {
    pub department_id: i32,
    pub version: i64,
    pub manager_id: Option<i32>,
    pub deputy_manager_id: Option<i32>,
    pub clear_manager: bool,
    pub clear_deputy: bool,
}

impl SweepAction {
    fn key(&self) -> (i32, Option<i32>, Option<i32>) {
        (self.department_id, self.manager_id, self.deputy_manager_id)
    }

    fn patch(&self) -> UpdateDepartment {
        UpdateDepartment {
            manager_id: self.clear_manager.then_some(None),
            deputy_manager_id: self.clear_deputy.then_some(None),
            expected_version: Some(self.version),
            ..Default::default()
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cleared: Vec<i32>,
    pub failed: Vec<(i32, String)>,
    /// Repaired elsewhere, or already being repaired by an overlapping sweep.
    pub skipped: Vec<i32>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.cleared.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Repair needed for one department, if any.
fn assess(department: &Department, is_member: impl Fn(i32) -> bool) -> Option<SweepAction> {
    let manager_valid = department.manager_id.is_none_or(&is_member);
    let deputy_valid = department.deputy_manager_id.is_none_or(&is_member);

    let (clear_manager, clear_deputy) = if !manager_valid {
        (true, department.deputy_manager_id.is_some())
    } else if !deputy_valid {
        (false, true)
    } else {
        return None;
    };

    Some(SweepAction {
        department_id: department.id,
        version: department.version,
        manager_id: department.manager_id,
        deputy_manager_id: department.deputy_manager_id,
        clear_manager,
        clear_deputy,
    })
}

/// Departments whose manager or deputy reference is invalid.
pub fn plan(snapshot: &Snapshot) -> Vec<SweepAction> {
    snapshot
        .departments
        .iter()
        .filter_map(|d| {
            assess(d, |employee_id| {
                snapshot.employee(employee_id).is_some_and(|e| e.is_member_of(d.id))
            })
        })
        .collect()
}

/// Re-read a department and the people it references.
async fn reassess<S: DocumentStore + ?Sized>(store: &S, department_id: i32) -> Result<Option<SweepAction>> {
    let Some(department) = store.get_department(department_id).await? else {
        return Ok(None);
    };

    let mut members = HashSet::new();
    for id in [department.manager_id, department.deputy_manager_id].into_iter().flatten() {
        if let Some(employee) = store.get_employee(id).await?
            && employee.is_member_of(department.id)
        {
            members.insert(id);
        }
    }
    Ok(assess(&department, |id| members.contains(&id)))
}

/// Runs sweeps, never issuing the same repair twice concurrently.
///
/// Each repair holds the department's lock, shared with the
/// [`Reassigner`](super::Reassigner) when built with
/// [`Reconciler::with_locks`], so it never lands in the middle of a move.
#[derive(Debug, Default)]
pub struct Reconciler {
    locks: DepartmentLocks,
    in_flight: Mutex<HashSet<(i32, Option<i32>, Option<i32>)>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locks(locks: DepartmentLocks) -> Self {
        Self {
            locks,
            in_flight: Mutex::default(),
        }
    }

    /// Repair every invalid department in the snapshot.
    ///
    /// Failures are logged and recorded per department; the others still run.
    pub async fn sweep<S: DocumentStore + ?Sized>(&self, store: &S, snapshot: &Snapshot) -> SweepReport {
        let mut report = SweepReport::default();

        for planned in plan(snapshot) {
            let department_id = planned.department_id;
            let key = planned.key();
            let claimed = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key);
            if !claimed {
                report.skipped.push(department_id);
                continue;
            }

            let outcome = self.repair(store, department_id).await;
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);

            match outcome {
                Ok(Some(action)) => {
                    info!(
                        "Cleared invalid manager reference on department {} (manager {:?}, deputy {:?})",
                        department_id, action.manager_id, action.deputy_manager_id
                    );
                    report.cleared.push(department_id);
                }
                Ok(None) => {
                    debug!("Department {} no longer needs repair", department_id);
                    report.skipped.push(department_id);
                }
                Err(e @ AppError::Conflict { .. }) => {
                    // A newer snapshot will re-evaluate this department.
                    debug!("Sweep skipped department {}: {}", department_id, e);
                    report.failed.push((department_id, e.to_string()));
                }
                Err(e) => {
                    warn!("Sweep failed for department {}: {}", department_id, e);
                    report.failed.push((department_id, e.to_string()));
                }
            }
        }

        report
    }

    /// Repair one department under its lock, judged on current records.
    async fn repair<S: DocumentStore + ?Sized>(&self, store: &S, department_id: i32) -> Result<Option<SweepAction>> {
        let _guard = self.locks.acquire([department_id]).await;
        let Some(action) = reassess(store, department_id).await? else {
            return Ok(None);
        };
        store.update_department(department_id, action.patch()).await?;
        Ok(Some(action))
    }

    /// Load both collections and sweep them.
    pub async fn run_once<S: DocumentStore + ?Sized>(&self, store: &S) -> Result<SweepReport> {
        let snapshot = store.snapshot().await?;
        Ok(self.sweep(store, &snapshot).await)
    }
}

/// Sweep once, then again after every burst of change events.
///
/// The task ends when the store drops its change channel.
pub fn spawn_reconciler<S: DocumentStore + ?Sized + 'static>(store: Arc<S>, reconciler: Arc<Reconciler>) -> JoinHandle<()> {
    let mut changes = store.subscribe();

    tokio::spawn(async move {
        loop {
            match reconciler.run_once(store.as_ref()).await {
                Ok(report) if !report.is_clean() => {
                    info!(
                        "Sweep: {} cleared, {} failed, {} skipped",
                        report.cleared.len(),
                        report.failed.len(),
                        report.skipped.len()
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("Sweep could not load org chart: {}", e),
            }

            match changes.recv().await {
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => debug!("Reconciler lagged by {} events", missed),
                Err(RecvError::Closed) => break,
            }
            // Coalesce the rest of the burst into one sweep.
            while let Ok(_) | Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) = changes.try_recv() {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Employee, Role};
    use crate::store::MemoryStore;

    fn snapshot() -> Snapshot {
        let dept = |id, manager_id, deputy_manager_id| Department {
            id,
            name: format!("D{id}"),
            manager_id,
            deputy_manager_id,
            parent_id: None,
            display_order: 0,
            is_active: true,
            version: 1,
        };
        let emp = |id, department_id| Employee {
            id,
            employee_code: format!("E{id}"),
            full_name: format!("Employee {id}"),
            department_id: Some(department_id),
            sub_department_id: None,
            role: Role::Staff,
            position: String::new(),
            is_active: true,
            version: 1,
        };
        Snapshot {
            departments: vec![
                dept(1, Some(10), Some(11)),
                dept(2, Some(10), Some(12)),
                dept(3, Some(12), Some(10)),
                dept(4, Some(99), None),
                dept(5, None, None),
            ],
            employees: vec![emp(10, 1), emp(11, 1), emp(12, 3)],
        }
    }

    #[test]
    fn test_plan_flags_only_invalid_departments() {
        let actions = plan(&snapshot());
        let summary: Vec<_> = actions
            .iter()
            .map(|a| (a.department_id, a.clear_manager, a.clear_deputy))
            .collect();
        assert_eq!(summary, vec![(2, true, true), (3, false, true), (4, true, false)]);
    }

    #[test]
    fn test_patch_leaves_valid_manager_alone() {
        let action = plan(&snapshot()).into_iter().find(|a| a.department_id == 3).unwrap();
        let patch = action.patch();
        assert_eq!(patch.manager_id, None);
        assert_eq!(patch.deputy_manager_id, Some(None));
        assert_eq!(patch.expected_version, Some(1));
    }

    #[tokio::test]
    async fn test_claimed_repair_is_skipped() {
        let store = MemoryStore::sample();
        store
            .update_department(2, UpdateDepartment {
                manager_id: Some(Some(1)),
                ..Default::default()
            })
            .await
            .unwrap();
        let writes = store.write_count().await;
        let snapshot = store.snapshot().await.unwrap();

        let reconciler = Reconciler::new();
        reconciler.in_flight.lock().unwrap().insert((2, Some(1), None));
        let report = reconciler.sweep(&store, &snapshot).await;

        assert_eq!(report.skipped, vec![2]);
        assert!(report.cleared.is_empty());
        assert_eq!(store.write_count().await, writes);

        reconciler.in_flight.lock().unwrap().clear();
        let report = reconciler.sweep(&store, &snapshot).await;
        assert_eq!(report.cleared, vec![2]);
    }
}
