//! Compensating-action log for multi-record writes.
//!
//! The store has no multi-document transactions. Every write made through a
//! [`Journal`] remembers the record as it was before the first touch; on
//! failure the journal writes those records back, newest first.

use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::models::{Department, Employee, UpdateDepartment, UpdateEmployee};
use crate::store::DocumentStore;

#[derive(Debug)]
enum Touched {
    Employee { before: Employee, version: i64 },
    Department { before: Department, version: i64 },
}

/// Write log over a store.
pub struct Journal<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    entries: Vec<Touched>,
    writes: usize,
}

impl<'a, S: DocumentStore + ?Sized> Journal<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            entries: Vec::new(),
            writes: 0,
        }
    }

    /// Writes applied so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Update an employee, remembering `before` for rollback.
    pub async fn update_employee(&mut self, before: &Employee, patch: UpdateEmployee) -> Result<Employee> {
        let after = self.store.update_employee(before.id, patch).await?;
        if after.version == before.version {
            return Ok(after);
        }
        self.writes += 1;

        let existing = self.entries.iter_mut().find_map(|entry| match entry {
            Touched::Employee { before: b, version } if b.id == before.id => Some(version),
            _ => None,
        });
        match existing {
            Some(version) => *version = after.version,
            None => self.entries.push(Touched::Employee {
                before: before.clone(),
                version: after.version,
            }),
        }
        Ok(after)
    }

    /// Update a department, remembering `before` for rollback.
    pub async fn update_department(&mut self, before: &Department, patch: UpdateDepartment) -> Result<Department> {
        let after = self.store.update_department(before.id, patch).await?;
        if after.version == before.version {
            return Ok(after);
        }
        self.writes += 1;

        let existing = self.entries.iter_mut().find_map(|entry| match entry {
            Touched::Department { before: b, version } if b.id == before.id => Some(version),
            _ => None,
        });
        match existing {
            Some(version) => *version = after.version,
            None => self.entries.push(Touched::Department {
                before: before.clone(),
                version: after.version,
            }),
        }
        Ok(after)
    }

    /// Restore every touched record, newest first.
    ///
    /// Each restore is conditional on the version this journal wrote, so a
    /// record changed by someone else in the meantime is left alone and
    /// reported.
    pub async fn rollback(self) -> Result<usize> {
        let mut restored = 0;
        let mut failures = Vec::new();

        for entry in self.entries.into_iter().rev() {
            let outcome = match &entry {
                Touched::Employee { before, version } => {
                    let patch = UpdateEmployee {
                        expected_version: Some(*version),
                        ..UpdateEmployee::restore(before)
                    };
                    self.store.update_employee(before.id, patch).await.map(|_| ())
                }
                Touched::Department { before, version } => {
                    let patch = UpdateDepartment {
                        expected_version: Some(*version),
                        ..UpdateDepartment::restore(before)
                    };
                    self.store.update_department(before.id, patch).await.map(|_| ())
                }
            };

            match outcome {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!("Rollback of {:?} failed: {}", entry, e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            Ok(restored)
        } else {
            Err(AppError::store(failures.join("; ")))
        }
    }

    /// Finish a journaled sequence: keep the writes on success, undo them
    /// on failure.
    pub async fn settle<T>(self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(cause) if self.entries.is_empty() => Err(cause),
            Err(cause) => {
                let touched = self.entries.len();
                match self.rollback().await {
                    Ok(restored) => {
                        info!("Rolled back {} record(s) after: {}", restored, cause);
                        Err(cause)
                    }
                    Err(rollback) => {
                        error!("Rollback of {} record(s) incomplete after '{}': {}", touched, cause, rollback);
                        Err(AppError::RollbackFailed {
                            cause: cause.to_string(),
                            rollback: rollback.to_string(),
                        })
                    }
                }
            }
        }
    }
}
