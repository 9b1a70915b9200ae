//! Shared fixtures for the org chart integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gianged_orgchart::models::UpdateDepartment;
use gianged_orgchart::orgchart::{SuccessionChoice, SuccessionDialog, SuccessionPrompt};
use gianged_orgchart::store::{DocumentStore, MemoryStore, Snapshot};

/// Dialog that replays canned answers and records every prompt.
#[derive(Default)]
pub struct ScriptedDialog {
    answers: Mutex<VecDeque<Option<SuccessionChoice>>>,
    prompts: Mutex<Vec<SuccessionPrompt>>,
}

impl ScriptedDialog {
    pub fn answering(answers: impl IntoIterator<Item = Option<SuccessionChoice>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A dialog that must never be asked.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<SuccessionPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuccessionDialog for ScriptedDialog {
    async fn choose_successor(&self, prompt: SuccessionPrompt) -> Option<SuccessionChoice> {
        self.prompts.lock().unwrap().push(prompt);
        self.answers.lock().unwrap().pop_front().flatten()
    }
}

/// Dialog that edits the vacated department while the user is deciding.
pub struct InterferingDialog {
    pub store: Arc<MemoryStore>,
    pub choice: SuccessionChoice,
}

#[async_trait]
impl SuccessionDialog for InterferingDialog {
    async fn choose_successor(&self, prompt: SuccessionPrompt) -> Option<SuccessionChoice> {
        self.store
            .update_department(prompt.department.id, UpdateDepartment {
                display_order: Some(prompt.department.display_order + 10),
                ..Default::default()
            })
            .await
            .unwrap();
        Some(self.choice)
    }
}

/// Snapshot with versions zeroed, for comparing record contents.
pub fn contents(mut snapshot: Snapshot) -> Snapshot {
    for d in &mut snapshot.departments {
        d.version = 0;
    }
    for e in &mut snapshot.employees {
        e.version = 0;
    }
    snapshot
}

/// Every set manager id points at a member of its department.
pub fn managers_are_members(snapshot: &Snapshot) -> bool {
    snapshot.departments.iter().all(|d| {
        d.manager_id
            .is_none_or(|m| snapshot.employee(m).is_some_and(|e| e.is_member_of(d.id)))
    })
}
