//! Consistency sweep and the background reconciler.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedDialog, managers_are_members};
use gianged_orgchart::models::UpdateDepartment;
use gianged_orgchart::orgchart::{
    DepartmentLocks, DropOutcome, DropRequest, Reassigner, Reconciler, spawn_reconciler,
};
use gianged_orgchart::store::{DocumentStore, MemoryStore};

async fn set_leaders(store: &MemoryStore, department_id: i32, manager_id: Option<i32>, deputy_manager_id: Option<i32>) {
    store
        .update_department(department_id, UpdateDepartment {
            manager_id: Some(manager_id),
            deputy_manager_id: Some(deputy_manager_id),
            ..Default::default()
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sweep_clears_outside_manager_once() {
    let store = MemoryStore::sample();
    set_leaders(&store, 2, Some(1), None).await;
    let reconciler = Reconciler::new();

    let first = reconciler.run_once(&store).await.unwrap();
    assert_eq!(first.cleared, vec![2]);
    assert!(first.failed.is_empty());
    assert_eq!(store.write_count().await, 2);

    let snapshot = store.snapshot().await.unwrap();
    assert!(managers_are_members(&snapshot));
    assert_eq!(snapshot.department(2).unwrap().manager_id, None);

    let second = reconciler.run_once(&store).await.unwrap();
    assert!(second.is_clean());
    assert_eq!(store.write_count().await, 2);
}

#[tokio::test]
async fn test_sweep_clears_deputy_with_invalid_manager() {
    let store = MemoryStore::sample();
    set_leaders(&store, 2, Some(1), Some(5)).await;

    Reconciler::new().run_once(&store).await.unwrap();

    let finance = store.get_department(2).await.unwrap().unwrap();
    assert_eq!(finance.manager_id, None);
    assert_eq!(finance.deputy_manager_id, None);
}

#[tokio::test]
async fn test_sweep_keeps_valid_manager_when_only_deputy_is_stale() {
    let store = MemoryStore::sample();
    set_leaders(&store, 1, Some(1), Some(4)).await;

    Reconciler::new().run_once(&store).await.unwrap();

    let operations = store.get_department(1).await.unwrap().unwrap();
    assert_eq!(operations.manager_id, Some(1));
    assert_eq!(operations.deputy_manager_id, None);
}

#[tokio::test]
async fn test_sub_department_member_is_a_valid_manager() {
    let store = MemoryStore::sample();
    // Employee 6 sits in Warehouse, a sub-department of Operations.
    set_leaders(&store, 1, Some(6), None).await;
    let writes = store.write_count().await;

    let report = Reconciler::new().run_once(&store).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(store.write_count().await, writes);
}

#[tokio::test]
async fn test_overlapping_sweeps_write_once() {
    let store = MemoryStore::sample();
    set_leaders(&store, 2, Some(1), None).await;
    let snapshot = store.snapshot().await.unwrap();
    let reconciler = Reconciler::new();

    let (a, b) = tokio::join!(reconciler.sweep(&store, &snapshot), reconciler.sweep(&store, &snapshot));

    assert_eq!(a.cleared.len() + b.cleared.len(), 1);
    assert_eq!(a.skipped.len() + b.skipped.len(), 1);
    assert!(a.failed.is_empty() && b.failed.is_empty());
    assert_eq!(store.write_count().await, 2);
}

#[tokio::test]
async fn test_one_failed_repair_does_not_block_others() {
    let store = MemoryStore::sample();
    set_leaders(&store, 2, Some(1), None).await;
    set_leaders(&store, 4, Some(1), None).await;
    store.fail_nth_write(1).await;

    let report = Reconciler::new().run_once(&store).await.unwrap();

    let failed: Vec<i32> = report.failed.iter().map(|(id, _)| *id).collect();
    assert_eq!(failed, vec![2]);
    assert_eq!(report.cleared, vec![4]);
    assert_eq!(store.get_department(2).await.unwrap().unwrap().manager_id, Some(1));
    assert_eq!(store.get_department(4).await.unwrap().unwrap().manager_id, None);
}

#[tokio::test]
async fn test_sweep_waits_for_department_lock_and_rechecks() {
    let store = Arc::new(MemoryStore::sample());
    set_leaders(&store, 2, Some(4), Some(1)).await;
    let snapshot = store.snapshot().await.unwrap();
    let locks = DepartmentLocks::new();
    let reconciler = Arc::new(Reconciler::with_locks(locks.clone()));

    let held = locks.acquire([2]).await;
    let task = {
        let store = store.clone();
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.sweep(store.as_ref(), &snapshot).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!task.is_finished());

    // The lock holder fixes the deputy itself.
    set_leaders(&store, 2, Some(4), None).await;
    let writes = store.write_count().await;
    drop(held);

    let report = task.await.unwrap();
    assert_eq!(report.skipped, vec![2]);
    assert!(report.failed.is_empty());
    assert_eq!(store.write_count().await, writes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_reconciler_does_not_undo_a_move() {
    let store = Arc::new(MemoryStore::sample());
    set_leaders(&store, 2, Some(4), Some(5)).await;
    let reassigner = Reassigner::new(store.clone());
    let reconciler = Arc::new(Reconciler::with_locks(reassigner.locks().clone()));
    let task = spawn_reconciler(store.clone(), reconciler);

    let outcome = reassigner
        .handle_drop(
            DropRequest {
                employee_id: 5,
                zone_id: 4,
            },
            &ScriptedDialog::silent(),
        )
        .await;
    task.abort();

    assert!(matches!(outcome, Ok(DropOutcome::Moved(_))), "{outcome:?}");
    let finance = store.get_department(2).await.unwrap().unwrap();
    assert_eq!(finance.manager_id, Some(4));
    assert_eq!(finance.deputy_manager_id, None);
    assert_eq!(store.get_employee(5).await.unwrap().unwrap().department_id, Some(4));
}

#[tokio::test]
async fn test_background_reconciler_repairs_after_changes() {
    let store = Arc::new(MemoryStore::sample());
    let task = spawn_reconciler(store.clone(), Arc::new(Reconciler::new()));

    set_leaders(&store, 2, Some(1), Some(5)).await;

    let mut repaired = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let finance = store.get_department(2).await.unwrap().unwrap();
        if finance.manager_id.is_none() {
            repaired = true;
            break;
        }
    }
    task.abort();

    assert!(repaired, "reconciler did not clear the invalid manager");
    assert!(managers_are_members(&store.snapshot().await.unwrap()));
}
