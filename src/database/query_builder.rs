use serde_json::Value;
use sqlx::{self, postgres::PgArguments, PgPool, Row};

use crate::database::manager::DatabaseError;
use crate::filter::SqlResult;

/// Run a statement whose single `row` column holds each record as JSON
pub async fn fetch_rows(pool: &PgPool, sql: &SqlResult) -> Result<Vec<Value>, DatabaseError> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query(q, p);
    }
    let rows = q.fetch_all(pool).await?;
    rows.iter().map(decode_row).collect()
}

pub async fn fetch_optional_row(pool: &PgPool, sql: &SqlResult) -> Result<Option<Value>, DatabaseError> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query(q, p);
    }
    let row = q.fetch_optional(pool).await?;
    row.as_ref().map(decode_row).transpose()
}

pub async fn fetch_count(pool: &PgPool, sql: &SqlResult) -> Result<i64, DatabaseError> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query(q, p);
    }
    let row = q.fetch_one(pool).await?;
    let count: i64 = row.try_get("count")?;
    Ok(count)
}

/// Rows affected
pub async fn execute(pool: &PgPool, sql: &SqlResult) -> Result<u64, DatabaseError> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query(q, p);
    }
    Ok(q.execute(pool).await?.rows_affected())
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Value, DatabaseError> {
    let value: Value = row.try_get("row")?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(DatabaseError::QueryError(format!("expected a JSON object row, got {}", value)))
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Whole records travel as JSONB
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
