pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod models;
pub mod orgchart;
pub mod store;
pub mod ui;

pub use error::{AppError, Result};
