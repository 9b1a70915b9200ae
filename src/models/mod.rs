//! Data models for departments and employees.

pub mod department;
pub mod employee;

pub use department::{CreateDepartment, Department, UpdateDepartment};
pub use employee::{CreateEmployee, Employee, Role, UpdateEmployee};
