//! Replacement-manager handoff between the drop handler and a dialog.
//!
//! When a manager is dragged out of the department they lead, the workflow
//! builds a [`SuccessionPrompt`] and waits on a [`SuccessionRequest`] while
//! the dialog holds the matching [`SuccessionResponder`]. Dropping the
//! responder without answering cancels the move.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, Result};
use crate::models::{Department, Employee};
use crate::store::Snapshot;

/// Answer to a succession prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessionChoice {
    /// Promote this employee.
    Replace(i32),
    /// Leave the department without a manager. Only offered when nobody
    /// else is eligible.
    LeaveVacant,
}

/// Everything the dialog needs to ask for a replacement.
#[derive(Debug, Clone)]
pub struct SuccessionPrompt {
    pub department: Department,
    pub outgoing: Employee,
    pub candidates: Vec<Employee>,
}

impl SuccessionPrompt {
    pub fn new(snapshot: &Snapshot, department: &Department, outgoing: &Employee) -> Self {
        Self {
            department: department.clone(),
            outgoing: outgoing.clone(),
            candidates: candidates(snapshot, department.id, outgoing.id),
        }
    }

    /// Vacancy is allowed only when there is no one to promote.
    pub fn allows_vacancy(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Reject answers outside the offered roster.
    pub fn validate(&self, choice: SuccessionChoice) -> Result<()> {
        match choice {
            SuccessionChoice::Replace(id) if self.candidates.iter().any(|c| c.id == id) => Ok(()),
            SuccessionChoice::Replace(id) => Err(AppError::validation(format!(
                "Employee {id} is not eligible to lead {}",
                self.department.name
            ))),
            SuccessionChoice::LeaveVacant if self.allows_vacancy() => Ok(()),
            SuccessionChoice::LeaveVacant => Err(AppError::validation(format!(
                "Choose a new manager for {}",
                self.department.name
            ))),
        }
    }
}

/// Active members of the department other than the outgoing manager.
pub fn candidates(snapshot: &Snapshot, department_id: i32, outgoing_id: i32) -> Vec<Employee> {
    snapshot
        .members(department_id)
        .filter(|e| e.is_active && e.id != outgoing_id)
        .cloned()
        .collect()
}

/// Waiting side of a succession handoff.
#[derive(Debug)]
pub struct SuccessionRequest {
    reply: oneshot::Receiver<SuccessionChoice>,
}

impl SuccessionRequest {
    /// Wait for the dialog. `None` means cancelled.
    pub async fn wait(self) -> Option<SuccessionChoice> {
        self.reply.await.ok()
    }
}

/// Answering side of a succession handoff, owned by the dialog.
#[derive(Debug)]
pub struct SuccessionResponder {
    prompt: SuccessionPrompt,
    reply: Option<oneshot::Sender<SuccessionChoice>>,
}

impl SuccessionResponder {
    pub fn prompt(&self) -> &SuccessionPrompt {
        &self.prompt
    }

    /// Submit a choice. Invalid choices leave the request open.
    pub fn choose(&mut self, choice: SuccessionChoice) -> Result<()> {
        self.prompt.validate(choice)?;
        let reply = self
            .reply
            .take()
            .ok_or_else(|| AppError::validation("Succession already answered"))?;
        reply.send(choice).map_err(|_| AppError::Cancelled)
    }

    /// Whether a choice has been submitted.
    pub fn is_answered(&self) -> bool {
        self.reply.is_none()
    }

    /// Dismiss the dialog without choosing.
    pub fn cancel(self) {}
}

/// Open a handoff for the given prompt.
pub fn request(prompt: SuccessionPrompt) -> (SuccessionRequest, SuccessionResponder) {
    let (tx, rx) = oneshot::channel();
    (
        SuccessionRequest { reply: rx },
        SuccessionResponder {
            prompt,
            reply: Some(tx),
        },
    )
}

/// Something that can ask a person to pick a replacement manager.
#[async_trait]
pub trait SuccessionDialog: Send + Sync {
    /// `None` when the user cancels.
    async fn choose_successor(&self, prompt: SuccessionPrompt) -> Option<SuccessionChoice>;
}

/// Dialog that forwards prompts over a channel to the UI thread.
#[derive(Clone)]
pub struct ChannelDialog {
    tx: mpsc::UnboundedSender<SuccessionResponder>,
}

impl ChannelDialog {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SuccessionResponder>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SuccessionDialog for ChannelDialog {
    async fn choose_successor(&self, prompt: SuccessionPrompt) -> Option<SuccessionChoice> {
        let (pending, responder) = request(prompt);
        if self.tx.send(responder).is_err() {
            tracing::warn!("Succession dialog is gone, cancelling move");
            return None;
        }
        pending.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn snapshot() -> Snapshot {
        let emp = |id, dept, active, role| Employee {
            id,
            employee_code: format!("E{id}"),
            full_name: format!("Employee {id}"),
            department_id: Some(dept),
            sub_department_id: None,
            role,
            position: String::new(),
            is_active: active,
            version: 1,
        };
        Snapshot {
            departments: vec![Department {
                id: 1,
                name: "Sales".to_string(),
                manager_id: Some(1),
                deputy_manager_id: None,
                parent_id: None,
                display_order: 0,
                is_active: true,
                version: 1,
            }],
            employees: vec![
                emp(1, 1, true, Role::DepartmentHead),
                emp(2, 1, true, Role::Staff),
                emp(3, 1, false, Role::Staff),
                emp(4, 2, true, Role::Staff),
            ],
        }
    }

    #[test]
    fn test_candidates_exclude_outgoing_inactive_and_outsiders() {
        let ids: Vec<i32> = candidates(&snapshot(), 1, 1).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_vacancy_only_without_candidates() {
        let snap = snapshot();
        let prompt = SuccessionPrompt::new(&snap, &snap.departments[0], &snap.employees[0]);
        assert!(prompt.validate(SuccessionChoice::LeaveVacant).is_err());
        assert!(prompt.validate(SuccessionChoice::Replace(4)).is_err());
        assert!(prompt.validate(SuccessionChoice::Replace(2)).is_ok());
    }

    #[tokio::test]
    async fn test_dropping_responder_cancels() {
        let snap = snapshot();
        let prompt = SuccessionPrompt::new(&snap, &snap.departments[0], &snap.employees[0]);
        let (pending, responder) = request(prompt);
        responder.cancel();
        assert_eq!(pending.wait().await, None);
    }

    #[tokio::test]
    async fn test_invalid_choice_keeps_request_open() {
        let snap = snapshot();
        let prompt = SuccessionPrompt::new(&snap, &snap.departments[0], &snap.employees[0]);
        let (pending, mut responder) = request(prompt);

        assert!(responder.choose(SuccessionChoice::Replace(3)).is_err());
        assert!(!responder.is_answered());
        responder.choose(SuccessionChoice::Replace(2)).unwrap();
        assert_eq!(pending.wait().await, Some(SuccessionChoice::Replace(2)));
    }
}
