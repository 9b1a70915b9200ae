//! PostgreSQL store backed by the SeaORM repositories.

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tokio::sync::broadcast;

use super::{CHANGE_CHANNEL_CAPACITY, ChangeEvent, DocumentStore};
use crate::db::{self, UpdateOutcome};
use crate::error::{AppError, Result};
use crate::models::{CreateDepartment, CreateEmployee, Department, Employee, UpdateDepartment, UpdateEmployee};

/// Store over a SeaORM connection pool.
///
/// Change events are published for writes made through this instance;
/// writes from other clients surface on the next full reload.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
    changes: broadcast::Sender<ChangeEvent>,
}

impl PgStore {
    /// Wrap an open connection pool.
    pub fn new(db: DatabaseConnection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { db, changes }
    }

    fn notify(&self, event: ChangeEvent) {
        let _ = self.changes.send(event);
    }
}

/// Map a repository outcome onto the store contract, notifying on writes.
fn settle<M, T>(
    store: &PgStore,
    outcome: UpdateOutcome<M>,
    entity: &'static str,
    id: i32,
    expected: Option<i64>,
    event: ChangeEvent,
) -> Result<T>
where
    T: From<M>,
{
    match outcome {
        UpdateOutcome::Updated(model) => {
            store.notify(event);
            Ok(T::from(model))
        }
        UpdateOutcome::Unchanged(model) => Ok(T::from(model)),
        UpdateOutcome::Conflict { actual } => Err(AppError::Conflict {
            entity,
            id,
            expected: expected.unwrap_or_default(),
            actual,
        }),
        UpdateOutcome::NotFound => Err(AppError::not_found(format!("{entity} {id}"))),
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn list_departments(&self) -> Result<Vec<Department>> {
        let rows = db::department::list_all(&self.db).await?;
        Ok(rows.into_iter().map(Department::from).collect())
    }

    async fn list_employees(&self) -> Result<Vec<Employee>> {
        let rows = db::employee::list_all(&self.db).await?;
        Ok(rows.into_iter().map(Employee::from).collect())
    }

    async fn get_department(&self, id: i32) -> Result<Option<Department>> {
        Ok(db::department::get_by_id(&self.db, id).await?.map(Department::from))
    }

    async fn get_employee(&self, id: i32) -> Result<Option<Employee>> {
        Ok(db::employee::get_by_id(&self.db, id).await?.map(Employee::from))
    }

    async fn create_department(&self, data: CreateDepartment) -> Result<Department> {
        if db::department::name_exists(&self.db, &data.name, None).await? {
            return Err(AppError::validation(format!("Department '{}' already exists", data.name)));
        }
        let dept = Department::from(db::department::create(&self.db, data).await?);
        self.notify(ChangeEvent::DepartmentChanged(dept.id));
        Ok(dept)
    }

    async fn create_employee(&self, data: CreateEmployee) -> Result<Employee> {
        let emp = Employee::from(db::employee::create(&self.db, data).await?);
        self.notify(ChangeEvent::EmployeeChanged(emp.id));
        Ok(emp)
    }

    async fn update_department(&self, id: i32, data: UpdateDepartment) -> Result<Department> {
        let expected = data.expected_version;
        let outcome = db::department::update(&self.db, id, data).await?;
        settle(self, outcome, "department", id, expected, ChangeEvent::DepartmentChanged(id))
    }

    async fn update_employee(&self, id: i32, data: UpdateEmployee) -> Result<Employee> {
        let expected = data.expected_version;
        let outcome = db::employee::update(&self.db, id, data).await?;
        settle(self, outcome, "employee", id, expected, ChangeEvent::EmployeeChanged(id))
    }

    async fn delete_department(&self, id: i32) -> Result<bool> {
        let removed = db::department::delete(&self.db, id).await?;
        if removed {
            self.notify(ChangeEvent::DepartmentRemoved(id));
        }
        Ok(removed)
    }

    async fn delete_employee(&self, id: i32) -> Result<bool> {
        let removed = db::employee::delete(&self.db, id).await?;
        if removed {
            self.notify(ChangeEvent::EmployeeRemoved(id));
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
