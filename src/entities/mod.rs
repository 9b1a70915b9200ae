//! SeaORM entities for the `departments` and `employees` tables.

pub mod prelude;

pub mod departments;
pub mod employees;
