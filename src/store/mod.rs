//! Storage collaborator for database-bound segments.
//!
//! # Data Flow
//! ```text
//! [table:column] marker + request segment
//!     → Query::select(column).where_eq(column, value).get(table)
//!     → RouteStore::value(&Lookup)
//!     → Some(cell) | None (miss → 404) | StoreError (treated as a miss)
//! ```
//!
//! # Design Decisions
//! - Lookups are synchronous; the HTTP layer runs them on a blocking task
//! - No retries here; retry policy belongs to the store implementation
//! - `memory.rs` is the built-in implementation, seeded from configuration

pub mod memory;

pub use memory::MemoryStore;

use thiserror::Error;

/// Errors surfaced by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure talking to the backing store (includes timeouts).
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// How the column is compared against the request value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// `column = value`
    Equals,
    /// `column LIKE %value%`, used for encoded multi-value cells.
    Contains,
}

/// A single-value lookup: `select(column).where(column, value).get(table).value()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub value: &'a str,
    pub condition: Condition,
}

/// Fluent builder mirroring the collaborator's query surface.
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    column: &'a str,
    filter: Option<(&'a str, Condition)>,
}

impl<'a> Query<'a> {
    pub fn select(column: &'a str) -> Self {
        Self { column, filter: None }
    }

    pub fn where_eq(mut self, value: &'a str) -> Self {
        self.filter = Some((value, Condition::Equals));
        self
    }

    pub fn where_contains(mut self, value: &'a str) -> Self {
        self.filter = Some((value, Condition::Contains));
        self
    }

    /// Bind the table and produce the lookup. A query without a condition
    /// matches the empty string.
    pub fn get(self, table: &'a str) -> Lookup<'a> {
        let (value, condition) = self.filter.unwrap_or(("", Condition::Equals));
        Lookup {
            table,
            column: self.column,
            value,
            condition,
        }
    }
}

/// Source of values for database-bound segments.
pub trait RouteStore: Send + Sync {
    /// Value of `lookup.column` in the first row of `lookup.table` satisfying
    /// the condition, or `None` when no row matches.
    fn value(&self, lookup: &Lookup<'_>) -> Result<Option<String>, StoreError>;
}

impl<S: RouteStore + ?Sized> RouteStore for std::sync::Arc<S> {
    fn value(&self, lookup: &Lookup<'_>) -> Result<Option<String>, StoreError> {
        (**self).value(lookup)
    }
}
