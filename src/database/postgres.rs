use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::query_builder::{fetch_count, fetch_exists, fetch_json_row, fetch_json_rows};
use crate::database::store::{ExistsQuery, Row, RowSource, Store};
use crate::filter::error::FilterError;
use crate::filter::filter_where::{qualified, validate_identifier, MAIN_ALIAS};
use crate::filter::types::SqlResult;
use crate::filter::Filter;
use crate::pagination::cursor::{self, CursorRequest, CursorWindow};
use crate::resource::ResourceDescriptor;

/// `Store` over a PostgreSQL pool. Rows travel as `row_to_json` objects.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Read-only, repeatable-read transaction used for cursor pages
struct PgSnapshot {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RowSource for PgSnapshot {
    async fn count_rows(&mut self, filter: &Filter) -> Result<i64, DatabaseError> {
        let sql = filter.to_count_sql()?;
        fetch_count(&mut *self.tx, &sql).await
    }

    async fn fetch_rows(&mut self, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        let sql = filter.to_sql()?;
        fetch_json_rows(&mut *self.tx, &sql).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError> {
        let sql = filter.to_count_sql()?;
        debug!("count: {}", sql.query);
        fetch_count(&self.pool, &sql).await
    }

    async fn fetch(&self, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        let sql = filter.to_sql()?;
        debug!("select: {}", sql.query);
        fetch_json_rows(&self.pool, &sql).await
    }

    async fn cursor_window(&self, filter: &Filter, request: &CursorRequest) -> Result<CursorWindow, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        let mut snapshot = PgSnapshot { tx };
        let window = cursor::window(&mut snapshot, filter, request).await?;
        snapshot.tx.commit().await?;
        Ok(window)
    }

    async fn exists(&self, query: &ExistsQuery) -> Result<bool, DatabaseError> {
        let sql = exists_sql(query)?;
        fetch_exists(&self.pool, &sql).await
    }

    async fn insert(&self, descriptor: &ResourceDescriptor, values: Row) -> Result<Row, DatabaseError> {
        let sql = insert_sql(descriptor, &values)?;
        fetch_json_row(&self.pool, &sql)
            .await?
            .ok_or_else(|| DatabaseError::QueryError(format!("insert into {} returned no row", descriptor.table)))
    }

    async fn update(&self, descriptor: &ResourceDescriptor, key: &str, values: Row) -> Result<Option<Row>, DatabaseError> {
        let sql = update_sql(descriptor, key, &values)?;
        fetch_json_row(&self.pool, &sql).await
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

fn exists_sql(query: &ExistsQuery) -> Result<SqlResult, FilterError> {
    validate_identifier(&query.table)?;
    validate_identifier(&query.column)?;
    let mut conditions = vec![format!("LOWER({}::text) = LOWER($1)", qualified(MAIN_ALIAS, &query.column))];
    let mut params = vec![Value::String(query.value.clone())];
    if query.soft_delete {
        conditions.push(format!("{} IS NULL", qualified(MAIN_ALIAS, "deleted_at")));
    }
    if let Some((column, value)) = &query.ignore {
        validate_identifier(column)?;
        conditions.push(format!("{}::text <> $2", qualified(MAIN_ALIAS, column)));
        params.push(Value::String(value.clone()));
    }
    Ok(SqlResult {
        query: format!(
            "SELECT EXISTS (SELECT 1 FROM \"{}\" AS \"{}\" WHERE {})",
            query.table,
            MAIN_ALIAS,
            conditions.join(" AND ")
        ),
        params,
    })
}

fn insert_sql(descriptor: &ResourceDescriptor, values: &Row) -> Result<SqlResult, FilterError> {
    validate_identifier(descriptor.table)?;
    let mut columns = vec![];
    let mut placeholders = vec![];
    let mut params = vec![];
    for (column, value) in values {
        validate_identifier(column)?;
        params.push(value.clone());
        columns.push(format!("\"{}\"", column));
        placeholders.push(format!("${}{}", params.len(), descriptor.kind_of(column).sql_cast()));
    }
    let body = if columns.is_empty() {
        "DEFAULT VALUES".to_string()
    } else {
        format!("({}) VALUES ({})", columns.join(", "), placeholders.join(", "))
    };
    Ok(SqlResult {
        query: format!(
            "INSERT INTO \"{}\" AS \"{}\" {} RETURNING row_to_json(\"{}\")",
            descriptor.table, MAIN_ALIAS, body, MAIN_ALIAS
        ),
        params,
    })
}

fn update_sql(descriptor: &ResourceDescriptor, key: &str, values: &Row) -> Result<SqlResult, FilterError> {
    validate_identifier(descriptor.table)?;
    if values.is_empty() {
        return Err(FilterError::InvalidOperatorData("update without values".to_string()));
    }
    let mut assignments = vec![];
    let mut params = vec![];
    for (column, value) in values {
        validate_identifier(column)?;
        params.push(value.clone());
        assignments.push(format!("\"{}\" = ${}{}", column, params.len(), descriptor.kind_of(column).sql_cast()));
    }
    params.push(Value::String(key.to_string()));
    let mut conditions = vec![format!(
        "{} = ${}{}",
        qualified(MAIN_ALIAS, descriptor.key_column),
        params.len(),
        descriptor.kind_of(descriptor.key_column).sql_cast()
    )];
    if descriptor.soft_delete {
        conditions.push(format!("{} IS NULL", qualified(MAIN_ALIAS, "deleted_at")));
    }
    Ok(SqlResult {
        query: format!(
            "UPDATE \"{}\" AS \"{}\" SET {} WHERE {} RETURNING row_to_json(\"{}\")",
            descriptor.table,
            MAIN_ALIAS,
            assignments.join(", "),
            conditions.join(" AND "),
            MAIN_ALIAS
        ),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::user::USER_RESOURCE;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn exists_is_case_insensitive_and_ignores_self() {
        let sql = exists_sql(&ExistsQuery::new("user", "email", "A@B.com").ignoring("uuid", "u-1")).unwrap();
        assert_eq!(
            sql.query,
            "SELECT EXISTS (SELECT 1 FROM \"user\" AS \"t0\" WHERE LOWER(\"t0\".\"email\"::text) = LOWER($1) AND \"t0\".\"deleted_at\" IS NULL AND \"t0\".\"uuid\"::text <> $2)"
        );
        assert_eq!(sql.params, vec![json!("A@B.com"), json!("u-1")]);
        assert!(exists_sql(&ExistsQuery::new("user", "email; --", "x")).is_err());
    }

    #[test]
    fn insert_casts_by_column_kind() {
        let values = row(json!({"created_at": "2024-01-01T00:00:00", "fullname": "Ada", "uuid": "67e55044-10b1-426f-9247-bb680e5fe0c8"}));
        let sql = insert_sql(&USER_RESOURCE, &values).unwrap();
        assert_eq!(
            sql.query,
            "INSERT INTO \"user\" AS \"t0\" (\"created_at\", \"fullname\", \"uuid\") VALUES ($1::timestamp, $2, $3::uuid) RETURNING row_to_json(\"t0\")"
        );
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn update_targets_live_rows_by_key() {
        let values = row(json!({"fullname": "Ada"}));
        let sql = update_sql(&USER_RESOURCE, "67e55044-10b1-426f-9247-bb680e5fe0c8", &values).unwrap();
        assert_eq!(
            sql.query,
            "UPDATE \"user\" AS \"t0\" SET \"fullname\" = $1 WHERE \"t0\".\"uuid\" = $2::uuid AND \"t0\".\"deleted_at\" IS NULL RETURNING row_to_json(\"t0\")"
        );
        assert!(update_sql(&USER_RESOURCE, "x", &Row::new()).is_err());
    }
}
