//! Database connection pool and repositories.

pub mod connection;
pub mod department;
pub mod employee;

pub use connection::{TableCounts, connect, get_table_counts, get_version};

/// Result of a versioned update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<T> {
    /// Row written, version bumped.
    Updated(T),
    /// Patch matched the stored row; nothing written.
    Unchanged(T),
    /// Row is at a different version than the caller expected.
    Conflict { actual: i64 },
    /// No row with this id.
    NotFound,
}
