use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryScalar};
use sqlx::Executor;

use crate::database::manager::DatabaseError;
use crate::database::store::Row;
use crate::filter::types::SqlResult;

/// Run a statement selecting one `row_to_json(...)` column per row
pub async fn fetch_json_rows<'e, E>(executor: E, sql: &SqlResult) -> Result<Vec<Row>, DatabaseError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut q = sqlx::query_scalar::<_, Value>(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query_scalar(q, p);
    }
    let values = q.fetch_all(executor).await?;
    values.into_iter().map(into_row).collect()
}

/// Like `fetch_json_rows` for statements returning at most one row
pub async fn fetch_json_row<'e, E>(executor: E, sql: &SqlResult) -> Result<Option<Row>, DatabaseError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut q = sqlx::query_scalar::<_, Value>(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query_scalar(q, p);
    }
    q.fetch_optional(executor).await?.map(into_row).transpose()
}

pub async fn fetch_count<'e, E>(executor: E, sql: &SqlResult) -> Result<i64, DatabaseError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut q = sqlx::query_scalar::<_, i64>(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query_scalar(q, p);
    }
    Ok(q.fetch_one(executor).await?)
}

pub async fn fetch_exists<'e, E>(executor: E, sql: &SqlResult) -> Result<bool, DatabaseError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut q = sqlx::query_scalar::<_, bool>(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query_scalar(q, p);
    }
    Ok(q.fetch_one(executor).await?)
}

pub async fn execute<'e, E>(executor: E, sql: &SqlResult) -> Result<u64, DatabaseError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query(q, p);
    }
    Ok(q.execute(executor).await?.rows_affected())
}

fn into_row(value: Value) -> Result<Row, DatabaseError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::QueryError(format!("expected a JSON row, got {}", other))),
    }
}

fn bind_param_query<'q>(q: Query<'q, Postgres, PgArguments>, v: &Value) -> Query<'q, Postgres, PgArguments> {
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
        Value::String(s) => q.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

fn bind_param_query_scalar<'q, O>(
    q: QueryScalar<'q, Postgres, O, PgArguments>,
    v: &Value,
) -> QueryScalar<'q, Postgres, O, PgArguments> {
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
        Value::String(s) => q.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
