//! Department repository with CRUD operations.

use chrono::Utc;
use sea_orm::*;

use super::UpdateOutcome;
use crate::entities::{departments, prelude::*};
use crate::models::department::{CreateDepartment, Department, UpdateDepartment};

impl From<departments::Model> for Department {
    fn from(model: departments::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            manager_id: model.manager_id,
            deputy_manager_id: model.deputy_manager_id,
            parent_id: model.parent_id,
            display_order: model.display_order,
            is_active: model.is_active,
            version: model.version,
        }
    }
}

/// List all departments ordered by display_order and name.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<departments::Model>, DbErr> {
    Departments::find()
        .order_by_asc(departments::Column::DisplayOrder)
        .order_by_asc(departments::Column::Name)
        .all(db)
        .await
}

/// Get department by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<departments::Model>, DbErr> {
    Departments::find_by_id(id).one(db).await
}

/// Create a new department.
pub async fn create(db: &DatabaseConnection, data: CreateDepartment) -> Result<departments::Model, DbErr> {
    let model = departments::ActiveModel {
        name: Set(data.name),
        parent_id: Set(data.parent_id),
        display_order: Set(data.display_order),
        manager_id: Set(None),
        deputy_manager_id: Set(None),
        is_active: Set(true),
        version: Set(1),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    model.insert(db).await
}

/// Update an existing department.
///
/// The row is locked for the duration of the version check so two writers
/// holding the same `expected_version` cannot both succeed.
pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    data: UpdateDepartment,
) -> Result<UpdateOutcome<departments::Model>, DbErr> {
    let txn = db.begin().await?;

    let Some(model) = Departments::find_by_id(id).lock_exclusive().one(&txn).await? else {
        return Ok(UpdateOutcome::NotFound);
    };

    if let Some(expected) = data.expected_version
        && model.version != expected
    {
        return Ok(UpdateOutcome::Conflict { actual: model.version });
    }

    let current = Department::from(model.clone());
    let mut next = current.clone();
    data.apply_to(&mut next);
    if next == current {
        return Ok(UpdateOutcome::Unchanged(model));
    }

    let mut active: departments::ActiveModel = model.into();
    active.name = Set(next.name);
    active.manager_id = Set(next.manager_id);
    active.deputy_manager_id = Set(next.deputy_manager_id);
    active.parent_id = Set(next.parent_id);
    active.display_order = Set(next.display_order);
    active.is_active = Set(next.is_active);
    active.version = Set(current.version + 1);
    active.updated_at = Set(Utc::now().into());

    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(UpdateOutcome::Updated(updated))
}

/// Delete a department by ID.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
    let result = Departments::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Check if department name exists (for validation).
pub async fn name_exists(db: &DatabaseConnection, name: &str, exclude_id: Option<i32>) -> Result<bool, DbErr> {
    let mut query = Departments::find().filter(departments::Column::Name.eq(name));

    if let Some(id) = exclude_id {
        query = query.filter(departments::Column::Id.ne(id));
    }

    let count = query.count(db).await?;
    Ok(count > 0)
}
