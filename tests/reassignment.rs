//! Drag-and-drop reassignment against the in-memory store.

mod common;

use std::sync::Arc;

use common::{InterferingDialog, ScriptedDialog, contents, managers_are_members};
use gianged_orgchart::AppError;
use gianged_orgchart::models::{Role, UpdateDepartment, UpdateEmployee};
use gianged_orgchart::orgchart::{
    ChannelDialog, DropOutcome, DropRequest, NoOpReason, ReassignPhase, Reassigner, SuccessionChoice,
};
use gianged_orgchart::store::{DocumentStore, MemoryStore};

// Sample org: Operations(1, head 1) with sub-department Warehouse(3, head 3),
// Finance(2, head 4), Human Resources(4, no head).

fn setup() -> (Arc<MemoryStore>, Reassigner<MemoryStore>) {
    let store = Arc::new(MemoryStore::sample());
    let reassigner = Reassigner::new(store.clone());
    (store, reassigner)
}

fn drop_on(employee_id: i32, zone_id: i32) -> DropRequest {
    DropRequest { employee_id, zone_id }
}

#[tokio::test]
async fn test_non_manager_moves_with_one_write_and_no_prompt() {
    let (store, reassigner) = setup();
    let dialog = ScriptedDialog::silent();

    let outcome = reassigner.handle_drop(drop_on(2, 2), &dialog).await.unwrap();

    let DropOutcome::Moved(report) = outcome else {
        panic!("expected a move, got {outcome:?}");
    };
    assert_eq!(report.writes, 1);
    assert!(report.successors.is_empty());
    assert!(dialog.prompts().is_empty());
    assert_eq!(store.write_count().await, 1);

    let moved = store.get_employee(2).await.unwrap().unwrap();
    assert_eq!(moved.department_id, Some(2));
    assert_eq!(moved.sub_department_id, None);
    assert_eq!(moved.role, Role::Staff);
}

#[tokio::test]
async fn test_manager_move_promotes_chosen_replacement() {
    let (store, reassigner) = setup();
    let dialog = ScriptedDialog::answering([Some(SuccessionChoice::Replace(5))]);

    let outcome = reassigner.handle_drop(drop_on(4, 4), &dialog).await.unwrap();
    assert!(matches!(outcome, DropOutcome::Moved(_)));

    let prompts = dialog.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].department.id, 2);
    let candidates: Vec<i32> = prompts[0].candidates.iter().map(|c| c.id).collect();
    assert_eq!(candidates, vec![5]);

    let finance = store.get_department(2).await.unwrap().unwrap();
    assert_eq!(finance.manager_id, Some(5));
    let successor = store.get_employee(5).await.unwrap().unwrap();
    assert_eq!(successor.role, Role::DepartmentHead);

    let outgoing = store.get_employee(4).await.unwrap().unwrap();
    assert_eq!(outgoing.department_id, Some(4));
    assert_eq!(outgoing.role, Role::Staff);

    let hr = store.get_department(4).await.unwrap().unwrap();
    assert_eq!(hr.manager_id, None);
    assert!(managers_are_members(&store.snapshot().await.unwrap()));
}

#[tokio::test]
async fn test_cancelled_succession_changes_nothing() {
    let (store, reassigner) = setup();
    let before = store.snapshot().await.unwrap();
    let dialog = ScriptedDialog::answering([None]);

    let outcome = reassigner.handle_drop(drop_on(4, 4), &dialog).await.unwrap();

    assert_eq!(outcome, DropOutcome::Cancelled);
    assert_eq!(store.write_count().await, 0);
    assert_eq!(store.snapshot().await.unwrap(), before);
}

#[tokio::test]
async fn test_drop_on_same_container_is_a_no_op() {
    let (store, reassigner) = setup();
    let dialog = ScriptedDialog::silent();

    let outcome = reassigner.handle_drop(drop_on(2, 1), &dialog).await.unwrap();
    assert_eq!(outcome, DropOutcome::Unchanged(NoOpReason::SameContainer));

    let outcome = reassigner.handle_drop(drop_on(6, 3), &dialog).await.unwrap();
    assert_eq!(outcome, DropOutcome::Unchanged(NoOpReason::SameContainer));

    assert_eq!(store.write_count().await, 0);
    assert!(dialog.prompts().is_empty());
}

#[tokio::test]
async fn test_drop_on_unknown_or_inactive_zone_is_ignored() {
    let (store, reassigner) = setup();
    store
        .update_department(4, UpdateDepartment {
            is_active: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    let writes = store.write_count().await;
    let dialog = ScriptedDialog::silent();

    let outcome = reassigner.handle_drop(drop_on(2, 4), &dialog).await.unwrap();
    assert_eq!(outcome, DropOutcome::Unchanged(NoOpReason::InvalidTarget));

    let outcome = reassigner.handle_drop(drop_on(2, 99), &dialog).await.unwrap();
    assert_eq!(outcome, DropOutcome::Unchanged(NoOpReason::InvalidTarget));

    assert_eq!(store.write_count().await, writes);
}

#[tokio::test]
async fn test_drop_on_sub_department_keeps_parent_department() {
    let (store, reassigner) = setup();
    let dialog = ScriptedDialog::silent();

    reassigner.handle_drop(drop_on(2, 3), &dialog).await.unwrap();

    let moved = store.get_employee(2).await.unwrap().unwrap();
    assert_eq!(moved.department_id, Some(1));
    assert_eq!(moved.sub_department_id, Some(3));
    assert!(moved.is_member_of(1));
    assert!(moved.is_member_of(3));
    assert_eq!(store.write_count().await, 1);
}

#[tokio::test]
async fn test_manager_moving_into_own_sub_department_keeps_leading() {
    let (store, reassigner) = setup();
    let dialog = ScriptedDialog::silent();

    reassigner.handle_drop(drop_on(1, 3), &dialog).await.unwrap();

    assert!(dialog.prompts().is_empty());
    let operations = store.get_department(1).await.unwrap().unwrap();
    assert_eq!(operations.manager_id, Some(1));
    let head = store.get_employee(1).await.unwrap().unwrap();
    assert_eq!(head.sub_department_id, Some(3));
    assert_eq!(head.role, Role::DepartmentHead);
}

#[tokio::test]
async fn test_sub_department_head_successor_gets_sub_department_role() {
    let (store, reassigner) = setup();
    let dialog = ScriptedDialog::answering([Some(SuccessionChoice::Replace(6))]);

    reassigner.handle_drop(drop_on(3, 2), &dialog).await.unwrap();

    let warehouse = store.get_department(3).await.unwrap().unwrap();
    assert_eq!(warehouse.manager_id, Some(6));
    let successor = store.get_employee(6).await.unwrap().unwrap();
    assert_eq!(successor.role, Role::SubDepartmentHead);

    let outgoing = store.get_employee(3).await.unwrap().unwrap();
    assert_eq!(outgoing.department_id, Some(2));
    assert_eq!(outgoing.sub_department_id, None);
    assert_eq!(outgoing.role, Role::Staff);
}

#[tokio::test]
async fn test_replacement_outside_roster_is_rejected_before_writing() {
    let (store, reassigner) = setup();
    let dialog = ScriptedDialog::answering([Some(SuccessionChoice::Replace(1))]);

    let result = reassigner.handle_drop(drop_on(4, 4), &dialog).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(store.write_count().await, 0);
}

#[tokio::test]
async fn test_failure_mid_move_restores_previous_records() {
    let (store, reassigner) = setup();
    let before = contents(store.snapshot().await.unwrap());
    let dialog = ScriptedDialog::answering([Some(SuccessionChoice::Replace(5))]);

    // First write (Finance manager) succeeds, the promotion fails.
    store.fail_nth_write(2).await;
    let result = reassigner.handle_drop(drop_on(4, 4), &dialog).await;

    let err = result.unwrap_err();
    assert!(matches!(err, AppError::Store(_)));
    assert_eq!(err.user_message(), "Failed to move employee. Please try again.");
    assert_eq!(contents(store.snapshot().await.unwrap()), before);
}

#[tokio::test]
async fn test_department_changed_during_prompt_fails_with_conflict() {
    let store = Arc::new(MemoryStore::sample());
    let reassigner = Reassigner::new(store.clone());
    let dialog = InterferingDialog {
        store: store.clone(),
        choice: SuccessionChoice::Replace(5),
    };

    let result = reassigner.handle_drop(drop_on(4, 4), &dialog).await;

    assert!(matches!(
        result,
        Err(AppError::Conflict {
            entity: "department",
            id: 2,
            ..
        })
    ));
    // Only the interfering edit was written.
    assert_eq!(store.write_count().await, 1);
    let finance = store.get_department(2).await.unwrap().unwrap();
    assert_eq!(finance.manager_id, Some(4));
}

#[tokio::test]
async fn test_phase_returns_to_idle() {
    let (_store, reassigner) = setup();
    let phase = reassigner.phase();
    let dialog = ScriptedDialog::answering([Some(SuccessionChoice::Replace(5))]);

    reassigner.handle_drop(drop_on(4, 4), &dialog).await.unwrap();

    assert_eq!(*phase.borrow(), ReassignPhase::Idle);
}

#[tokio::test]
async fn test_channel_dialog_hands_prompt_to_the_ui() {
    let (store, reassigner) = setup();
    let reassigner = Arc::new(reassigner);
    let (dialog, mut requests) = ChannelDialog::new();

    let task = {
        let reassigner = reassigner.clone();
        tokio::spawn(async move { reassigner.handle_drop(drop_on(4, 4), &dialog).await })
    };

    let mut responder = requests.recv().await.unwrap();
    assert_eq!(responder.prompt().department.id, 2);
    assert!(matches!(
        *reassigner.phase().borrow(),
        ReassignPhase::AwaitingSuccession { employee_id: 4, department_id: 2 }
    ));

    // Invalid answers keep the request open.
    assert!(responder.choose(SuccessionChoice::LeaveVacant).is_err());
    assert!(!responder.is_answered());
    responder.choose(SuccessionChoice::Replace(5)).unwrap();

    let outcome = task.await.unwrap().unwrap();
    assert!(matches!(outcome, DropOutcome::Moved(_)));
    assert_eq!(store.get_department(2).await.unwrap().unwrap().manager_id, Some(5));
}

#[tokio::test]
async fn test_dropping_the_responder_cancels_the_move() {
    let (store, reassigner) = setup();
    let reassigner = Arc::new(reassigner);
    let (dialog, mut requests) = ChannelDialog::new();

    let task = {
        let reassigner = reassigner.clone();
        tokio::spawn(async move { reassigner.handle_drop(drop_on(4, 4), &dialog).await })
    };

    let responder = requests.recv().await.unwrap();
    responder.cancel();

    assert_eq!(task.await.unwrap().unwrap(), DropOutcome::Cancelled);
    assert_eq!(store.write_count().await, 0);
}

#[tokio::test]
async fn test_same_successor_for_two_vacated_departments() {
    let (store, reassigner) = setup();
    // Employee 1 also leads Warehouse, where they now sit.
    store
        .update_employee(1, UpdateEmployee {
            sub_department_id: Some(Some(3)),
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .update_department(3, UpdateDepartment {
            manager_id: Some(Some(1)),
            ..Default::default()
        })
        .await
        .unwrap();
    let dialog = ScriptedDialog::answering([
        Some(SuccessionChoice::Replace(6)),
        Some(SuccessionChoice::Replace(6)),
    ]);

    let outcome = reassigner.handle_drop(drop_on(1, 2), &dialog).await.unwrap();

    let DropOutcome::Moved(report) = outcome else {
        panic!("expected a move, got {outcome:?}");
    };
    assert_eq!(report.successors, vec![(1, Some(6)), (3, Some(6))]);
    let prompted: Vec<i32> = dialog.prompts().iter().map(|p| p.department.id).collect();
    assert_eq!(prompted, vec![1, 3]);

    assert_eq!(store.get_department(1).await.unwrap().unwrap().manager_id, Some(6));
    assert_eq!(store.get_department(3).await.unwrap().unwrap().manager_id, Some(6));
    let successor = store.get_employee(6).await.unwrap().unwrap();
    assert_eq!(successor.role, Role::DepartmentHead);

    let outgoing = store.get_employee(1).await.unwrap().unwrap();
    assert_eq!(outgoing.department_id, Some(2));
    assert_eq!(outgoing.sub_department_id, None);
    assert_eq!(outgoing.role, Role::Staff);
    assert!(managers_are_members(&store.snapshot().await.unwrap()));
}
