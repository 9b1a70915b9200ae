//! Department edit form: manager assignment and succession.

mod common;

use std::sync::Arc;

use common::{contents, managers_are_members};
use gianged_orgchart::AppError;
use gianged_orgchart::models::Role;
use gianged_orgchart::orgchart::health::{self, Issue};
use gianged_orgchart::orgchart::{DepartmentEdit, Reassigner};
use gianged_orgchart::store::{DocumentStore, MemoryStore};

fn setup() -> (Arc<MemoryStore>, Reassigner<MemoryStore>) {
    let store = Arc::new(MemoryStore::sample());
    let reassigner = Reassigner::new(store.clone());
    (store, reassigner)
}

async fn form(store: &MemoryStore, department_id: i32) -> DepartmentEdit {
    let department = store.get_department(department_id).await.unwrap().unwrap();
    DepartmentEdit::from_department(&department)
}

#[tokio::test]
async fn test_new_manager_replaces_existing_head() {
    let (store, reassigner) = setup();
    let edit = DepartmentEdit {
        manager_id: Some(5),
        ..form(&store, 2).await
    };

    let report = reassigner.edit_department(2, &edit).await.unwrap();

    assert_eq!(report.department.manager_id, Some(5));
    assert_eq!(report.promoted, Some(5));
    assert_eq!(report.demoted, vec![4]);
    assert_eq!(report.writes, 3);

    let snapshot = store.snapshot().await.unwrap();
    let heads: Vec<i32> = snapshot
        .members(2)
        .filter(|e| e.role == Role::DepartmentHead)
        .map(|e| e.id)
        .collect();
    assert_eq!(heads, vec![5]);
    assert_eq!(snapshot.employee(4).unwrap().role, Role::Staff);
}

#[tokio::test]
async fn test_manager_from_elsewhere_is_moved_in() {
    let (store, reassigner) = setup();
    let edit = DepartmentEdit {
        manager_id: Some(2),
        ..form(&store, 4).await
    };

    reassigner.edit_department(4, &edit).await.unwrap();

    let manager = store.get_employee(2).await.unwrap().unwrap();
    assert_eq!(manager.department_id, Some(4));
    assert_eq!(manager.sub_department_id, None);
    assert_eq!(manager.role, Role::DepartmentHead);
    assert!(health::check(&store.snapshot().await.unwrap()).is_empty());
}

#[tokio::test]
async fn test_taking_another_departments_head_leaves_it_vacant() {
    let (store, reassigner) = setup();
    let edit = DepartmentEdit {
        manager_id: Some(4),
        ..form(&store, 4).await
    };

    reassigner.edit_department(4, &edit).await.unwrap();

    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.department(2).unwrap().manager_id, None);
    assert!(managers_are_members(&snapshot));

    let warnings = health::check(&snapshot);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].department_id, 2);
    assert_eq!(warnings[0].issue, Issue::NoManager);
}

#[tokio::test]
async fn test_deputy_is_promoted_and_must_be_a_member() {
    let (store, reassigner) = setup();

    let outsider = DepartmentEdit {
        deputy_manager_id: Some(2),
        ..form(&store, 2).await
    };
    let result = reassigner.edit_department(2, &outsider).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(store.write_count().await, 0);

    let member = DepartmentEdit {
        deputy_manager_id: Some(5),
        ..form(&store, 2).await
    };
    reassigner.edit_department(2, &member).await.unwrap();

    assert_eq!(store.get_department(2).await.unwrap().unwrap().deputy_manager_id, Some(5));
    assert_eq!(store.get_employee(5).await.unwrap().unwrap().role, Role::DeputyManager);
}

#[tokio::test]
async fn test_parent_cannot_be_a_descendant() {
    let (store, reassigner) = setup();
    let edit = DepartmentEdit {
        parent_id: Some(3),
        ..form(&store, 1).await
    };

    let result = reassigner.edit_department(1, &edit).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(store.write_count().await, 0);
}

#[tokio::test]
async fn test_unchanged_form_writes_nothing() {
    let (store, reassigner) = setup();
    let edit = form(&store, 2).await;

    let report = reassigner.edit_department(2, &edit).await.unwrap();

    assert_eq!(report.writes, 0);
    assert!(report.demoted.is_empty());
    assert_eq!(store.write_count().await, 0);
}

#[tokio::test]
async fn test_failed_promotion_rolls_back_department() {
    let (store, reassigner) = setup();
    let before = contents(store.snapshot().await.unwrap());
    let edit = DepartmentEdit {
        manager_id: Some(5),
        ..form(&store, 2).await
    };

    store.fail_nth_write(2).await;
    let result = reassigner.edit_department(2, &edit).await;

    assert!(matches!(result, Err(AppError::Store(_))));
    assert_eq!(contents(store.snapshot().await.unwrap()), before);
}
