//! # elif-hydrate: Result-set hydration for elif.rs
//!
//! Turns the flat, denormalized rows of a join query back into an object
//! graph: a root collection of records, each carrying its one-to-one related
//! records and its to-many collections.
//!
//! Columns are expected to be named `<tableAlias>__<field>`; the table alias
//! map resolves physical aliases to component aliases and the alias map
//! describes how components hang together.

pub mod aggregate;
pub mod alias_map;
pub mod backends;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod hydrator;
pub mod inheritance;
pub mod parser;
pub mod query;
pub mod record;
pub mod row;
pub mod value;

// Re-export core traits and types
pub use aggregate::*;
pub use alias_map::*;
pub use backends::*;
pub use config::*;
pub use descriptor::*;
pub use error::*;
pub use hydrator::*;
pub use inheritance::*;
pub use parser::*;
pub use query::*;
pub use record::*;
pub use row::*;
pub use value::*;
