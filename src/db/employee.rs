//! Employee repository with CRUD operations.

use chrono::Utc;
use sea_orm::*;

use super::UpdateOutcome;
use crate::entities::{employees, prelude::*};
use crate::models::employee::{CreateEmployee, Employee, Role, UpdateEmployee};

impl From<employees::Model> for Employee {
    fn from(model: employees::Model) -> Self {
        let role = Role::parse(&model.role).unwrap_or_else(|| {
            tracing::warn!("Employee {} has unknown role '{}', treating as staff", model.id, model.role);
            Role::Staff
        });

        Self {
            id: model.id,
            employee_code: model.employee_code,
            full_name: model.full_name,
            department_id: model.department_id,
            sub_department_id: model.sub_department_id,
            role,
            position: model.position,
            is_active: model.is_active,
            version: model.version,
        }
    }
}

/// List all employees ordered by name.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<employees::Model>, DbErr> {
    Employees::find()
        .order_by_asc(employees::Column::FullName)
        .all(db)
        .await
}

/// Get employee by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<employees::Model>, DbErr> {
    Employees::find_by_id(id).one(db).await
}

/// Create a new employee.
pub async fn create(db: &DatabaseConnection, data: CreateEmployee) -> Result<employees::Model, DbErr> {
    let model = employees::ActiveModel {
        employee_code: Set(data.employee_code),
        full_name: Set(data.full_name),
        department_id: Set(data.department_id),
        sub_department_id: Set(data.sub_department_id),
        role: Set(data.role.as_str().to_string()),
        position: Set(data.position),
        is_active: Set(true),
        version: Set(1),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    model.insert(db).await
}

/// Update an existing employee under a row lock.
pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    data: UpdateEmployee,
) -> Result<UpdateOutcome<employees::Model>, DbErr> {
    let txn = db.begin().await?;

    let Some(model) = Employees::find_by_id(id).lock_exclusive().one(&txn).await? else {
        return Ok(UpdateOutcome::NotFound);
    };

    if let Some(expected) = data.expected_version
        && model.version != expected
    {
        return Ok(UpdateOutcome::Conflict { actual: model.version });
    }

    let current = Employee::from(model.clone());
    let mut next = current.clone();
    data.apply_to(&mut next);
    if next == current {
        return Ok(UpdateOutcome::Unchanged(model));
    }

    let mut active: employees::ActiveModel = model.into();
    active.employee_code = Set(next.employee_code);
    active.full_name = Set(next.full_name);
    active.department_id = Set(next.department_id);
    active.sub_department_id = Set(next.sub_department_id);
    active.role = Set(next.role.as_str().to_string());
    active.position = Set(next.position);
    active.is_active = Set(next.is_active);
    active.version = Set(current.version + 1);
    active.updated_at = Set(Utc::now().into());

    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(UpdateOutcome::Updated(updated))
}

/// Delete an employee by ID.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
    let result = Employees::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}
