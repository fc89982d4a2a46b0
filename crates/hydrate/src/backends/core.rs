//! Core Backend Traits
//!
//! A cursor is a forward-only row source that must be closed exactly once.
//! Executors turn a finalized SQL string and its parameters into a cursor.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::{HydrateError, HydrateResult};
use crate::row::FlatRow;
use crate::value::Value;

/// Forward-only result cursor
pub trait Cursor {
    /// Fetch the next row, `None` at end of data
    fn next_row(&mut self) -> HydrateResult<Option<FlatRow>>;

    /// Release the cursor
    fn close(&mut self) -> HydrateResult<()>;
}

/// Cursor over rows that were fetched up front
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: VecDeque<FlatRow>,
    closed: bool,
}

impl BufferedCursor {
    pub fn new(rows: impl IntoIterator<Item = FlatRow>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Rows not yet consumed
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Cursor for BufferedCursor {
    fn next_row(&mut self) -> HydrateResult<Option<FlatRow>> {
        if self.closed {
            return Err(HydrateError::Database("cursor is closed".to_string()));
        }
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) -> HydrateResult<()> {
        if self.closed {
            return Err(HydrateError::Database("cursor already closed".to_string()));
        }
        self.rows.clear();
        self.closed = true;
        Ok(())
    }
}

/// Synchronous statement executor
pub trait QueryExecutor {
    fn dialect(&self) -> SqlDialect;

    /// Execute `sql` with bound `params` and return a cursor over the result
    fn execute(&self, sql: &str, params: &[Value]) -> HydrateResult<Box<dyn Cursor + '_>>;
}

/// Asynchronous statement executor
#[async_trait]
pub trait AsyncQueryExecutor: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Execute `sql` with bound `params` and return a cursor over the result
    async fn open_cursor(&self, sql: &str, params: &[Value]) -> HydrateResult<Box<dyn Cursor + Send>>;
}

/// SQL dialect enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Check if this dialect supports boolean types
    pub fn supports_boolean(&self) -> bool {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => true,
            SqlDialect::MySQL => false,
        }
    }

    /// Rewrite boolean parameters as integers where the dialect has no
    /// boolean type
    pub fn convert_booleans(&self, params: Vec<Value>) -> Vec<Value> {
        if self.supports_boolean() {
            return params;
        }
        params
            .into_iter()
            .map(|param| match param {
                Value::Bool(b) => Value::Int32(b as i32),
                other => other,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_cursor_yields_rows_then_end() {
        let mut cursor = BufferedCursor::new(vec![
            FlatRow::new().with_column("u__id", 1),
            FlatRow::new().with_column("u__id", 2),
        ]);

        assert_eq!(cursor.remaining(), 2);
        assert!(cursor.next_row().unwrap().is_some());
        assert!(cursor.next_row().unwrap().is_some());
        assert!(cursor.next_row().unwrap().is_none());
    }

    #[test]
    fn test_buffered_cursor_closes_once() {
        let mut cursor = BufferedCursor::new(vec![FlatRow::new()]);
        cursor.close().unwrap();

        assert!(cursor.is_closed());
        assert!(cursor.close().is_err());
        assert!(cursor.next_row().is_err());
    }

    #[test]
    fn test_boolean_conversion() {
        let params = vec![Value::Bool(true), Value::from("x"), Value::Bool(false)];

        assert_eq!(
            SqlDialect::MySQL.convert_booleans(params.clone()),
            vec![Value::Int32(1), Value::from("x"), Value::Int32(0)]
        );
        assert_eq!(SqlDialect::PostgreSQL.convert_booleans(params.clone()), params);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::SQLite.parameter_placeholder(3), "?");
    }
}
