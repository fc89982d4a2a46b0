//! PostgreSQL Backend Implementation
//!
//! Executes statements through a sqlx pool and converts the fetched rows into
//! flat rows keyed by column name.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeZone;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Pool, Postgres};
use tracing::debug;

use super::core::*;
use crate::error::{HydrateError, HydrateResult};
use crate::row::FlatRow;
use crate::value::Value;

/// Executor backed by a PostgreSQL connection pool
///
/// The whole result set is fetched and converted while the cursor is opened;
/// the returned [`BufferedCursor`] then serves rows from memory, so the
/// connection goes back to the pool before hydration starts.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresExecutor {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    /// Connect a small pool to `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> HydrateResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| HydrateError::Database(format!("Failed to create PostgreSQL pool: {}", e)))?;

        Ok(Self::new(Arc::new(pool)))
    }
}

#[async_trait]
impl AsyncQueryExecutor for PostgresExecutor {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn open_cursor(&self, sql: &str, params: &[Value]) -> HydrateResult<Box<dyn Cursor + Send>> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_value(query, param);
        }

        let rows = query.fetch_all(&*self.pool).await?;
        debug!("Fetched {} rows for hydration", rows.len());

        let rows = rows
            .iter()
            .map(pg_row_to_flat_row)
            .collect::<HydrateResult<Vec<_>>>()?;

        Ok(Box::new(BufferedCursor::new(rows)))
    }
}

/// Bind a Value to a sqlx query
fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int32(i) => query.bind(*i),
        Value::Int64(i) => query.bind(*i),
        Value::Float64(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Uuid(u) => query.bind(*u),
        Value::DateTime(dt) => query.bind(*dt),
        Value::Date(d) => query.bind(*d),
        Value::Json(j) => query.bind(j.clone()),
    }
}

/// Convert every column of a PostgreSQL row, keyed by column name
pub fn pg_row_to_flat_row(row: &PgRow) -> HydrateResult<FlatRow> {
    use sqlx::{Column, Row};

    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| Ok((column.name().to_string(), pg_value(row, index)?)))
        .collect()
}

fn pg_value(row: &PgRow, index: usize) -> HydrateResult<Value> {
    use sqlx::{Column, Row, TypeInfo, ValueRef};

    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let type_name = row.columns()[index].type_info().name();

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get(index)?),
        "INT2" => Value::Int32(row.try_get::<i16, _>(index)? as i32),
        "INT4" => Value::Int32(row.try_get(index)?),
        "INT8" => Value::Int64(row.try_get(index)?),
        "FLOAT4" => Value::Float64(row.try_get::<f32, _>(index)? as f64),
        "FLOAT8" => Value::Float64(row.try_get(index)?),
        "BYTEA" => Value::Bytes(row.try_get(index)?),
        "UUID" => Value::Uuid(row.try_get(index)?),
        "TIMESTAMPTZ" => Value::DateTime(row.try_get(index)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index)?;
            Value::DateTime(chrono::Utc.from_utc_datetime(&naive))
        }
        "DATE" => Value::Date(row.try_get(index)?),
        "JSON" | "JSONB" => Value::Json(row.try_get::<JsonValue, _>(index)?),
        _ => Value::String(row.try_get(index).map_err(|e| {
            HydrateError::Database(format!(
                "Failed to decode column {} of unsupported type '{}': {}",
                index, type_name, e
            ))
        })?),
    };

    Ok(value)
}
