//! Execution of approved statements and dynamic result shaping.
//!
//! The column set of a generated query is not known until runtime, so rows
//! are shaped from column metadata into ordered maps of column name → JSON
//! value rather than into a fixed record type. Temporal and decimal values
//! are rendered as strings so every response stays plain JSON.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo};

use crate::error::TipsearchError;

/// Abstraction over statement execution so the pipeline can be tested with
/// spies that count calls without touching a database.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run an approved statement and return the shaped rows. An empty result
    /// set is success, not an error.
    async fn fetch(&self, sql: &str) -> Result<Vec<Map<String, Value>>, TipsearchError>;
}

/// Production executor over the least-privilege search pool.
#[derive(Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn fetch(&self, sql: &str) -> Result<Vec<Map<String, Value>>, TipsearchError> {
        // The sqlx error message carries the store's diagnostic but never
        // credentials or the connection URL.
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TipsearchError::QueryExecution(e.to_string()))?;

        Ok(rows.iter().map(row_to_object).collect())
    }
}

/// Shape one row into an ordered column → value map.
pub fn row_to_object(row: &PgRow) -> Map<String, Value> {
    let mut object = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_info().name());
        object.insert(column.name().to_string(), value);
    }
    object
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let decoded: Result<Value, sqlx::Error> = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .map(|v| v.map(Value::Bool).unwrap_or(Value::Null)),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        "NUMERIC" => row
            .try_get::<Option<rust_decimal::Decimal>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" => row
            .try_get::<Option<String>, _>(idx)
            .map(|v| v.map(Value::String).unwrap_or(Value::Null)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map(|t| Value::String(t.to_rfc3339())).unwrap_or(Value::Null)),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map(|v| v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null)),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .map(|v| v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map(|v| v.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null)),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(idx)
            .map(|v| v.unwrap_or(Value::Null)),
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => row
            .try_get::<Option<Vec<String>>, _>(idx)
            .map(|v| {
                v.map(|a| Value::Array(a.into_iter().map(Value::String).collect()))
                    .unwrap_or(Value::Null)
            }),
        other => {
            // e.g. TSVECTOR from SELECT * — not representable, render null
            tracing::debug!(column_type = other, "unsupported column type, rendering null");
            return Value::Null;
        }
    };

    match decoded {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(column_type = type_name, error = %e, "column decode failed, rendering null");
            Value::Null
        }
    }
}
