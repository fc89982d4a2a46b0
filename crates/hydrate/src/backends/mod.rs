//! Database Backend Abstractions
//!
//! Cursors and executors are the only way rows reach the hydrator. The
//! PostgreSQL backend is provided; other drivers plug in by implementing
//! `QueryExecutor` or `AsyncQueryExecutor`.

pub mod core;
pub mod postgres;

// Re-export core traits and types
pub use core::*;
pub use postgres::PostgresExecutor;
