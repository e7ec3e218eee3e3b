use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::database::manager::DatabaseError;
use crate::database::models::user::{parse_timestamp, USER_RESOURCE};
use crate::database::store::{ExistsQuery, Row, RowSource, Store, TIMESTAMP_FORMAT};
use crate::filter::{Filter, FilterOp, FilterOrderInfo, FilterTarget, FilterWhereInfo, SortDirection};
use crate::pagination::cursor::{self, CursorRequest, CursorWindow};
use crate::resource::{ColumnKind, ResourceDescriptor};
use crate::validation::scalar_text;

type Tables = HashMap<String, Vec<Row>>;

static SEED_PASSWORD_HASH: Lazy<String> =
    Lazy::new(|| crate::auth::hash_password("password").unwrap_or_default());

/// In-process store evaluating `Filter` plans with the same semantics as the
/// generated SQL. Backs the router tests and `--memory` runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: impl Into<String>, rows: Vec<Row>) -> Self {
        let mut tables = Tables::new();
        tables.insert(table.into(), rows);
        Self { tables: RwLock::new(tables) }
    }

    /// `count` users created one hour apart, newest last. User `n` has id `n`,
    /// uuid `fixture_uuid(n)`, username `user{n}`, email `user{n}@example.com`
    /// and password `password`; users after the first are created by user 1.
    pub fn seeded_users(count: i64) -> Self {
        let password = SEED_PASSWORD_HASH.clone();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let rows = (1..=count)
            .map(|n| {
                let created = (start + Duration::hours(n)).format(TIMESTAMP_FORMAT).to_string();
                let birth = (n <= 28).then(|| format!("1990-01-{:02}", n));
                let row = json!({
                    "id": n,
                    "uuid": crate::testing::fixture_uuid(n),
                    "created_at": created,
                    "updated_at": created,
                    "deleted_at": null,
                    "created_by": if n > 1 { json!(1) } else { Value::Null },
                    "updated_by": null,
                    "deleted_by": null,
                    "fullname": format!("User {}", n),
                    "username": format!("user{}", n),
                    "email": format!("user{}@example.com", n),
                    "phone": format!("08{:08}", n),
                    "password": password,
                    "date_of_birth": birth,
                    "address": format!("{} Main Street", n),
                    "image": null,
                    "image_url": null,
                    "last_login_at": null,
                    "last_login_ip": null,
                });
                match row {
                    Value::Object(map) => map,
                    _ => Row::new(),
                }
            })
            .collect();
        Self::with_table(USER_RESOURCE.table, rows)
    }

    /// Overwrite `column` on every row of `table`
    pub async fn set_column(&self, table: &str, column: &str, value: Value) {
        let mut tables = self.tables.write().await;
        for row in tables.entry(table.to_string()).or_default() {
            row.insert(column.to_string(), value.clone());
        }
    }

    /// Every stored row of `table`, deleted ones included
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    async fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot { tables: self.tables.read().await.clone() }
    }
}

/// Frozen copy of the tables, used for multi-step reads
struct MemorySnapshot {
    tables: Tables,
}

#[async_trait]
impl RowSource for MemorySnapshot {
    async fn count_rows(&mut self, filter: &Filter) -> Result<i64, DatabaseError> {
        Ok(matching(&self.tables, filter)?.len() as i64)
    }

    async fn fetch_rows(&mut self, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        select(&self.tables, filter)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(matching(&tables, filter)?.len() as i64)
    }

    async fn fetch(&self, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        let tables = self.tables.read().await;
        select(&tables, filter)
    }

    async fn cursor_window(&self, filter: &Filter, request: &CursorRequest) -> Result<CursorWindow, DatabaseError> {
        let mut snapshot = self.snapshot().await;
        cursor::window(&mut snapshot, filter, request).await
    }

    async fn exists(&self, query: &ExistsQuery) -> Result<bool, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(&query.table)
            .ok_or_else(|| DatabaseError::QueryError(format!("relation \"{}\" does not exist", query.table)))?;
        let needle = query.value.to_lowercase();
        Ok(rows.iter().any(|row| {
            if query.soft_delete && is_deleted(row) {
                return false;
            }
            if let Some((column, value)) = &query.ignore {
                if cell_text(row, column).as_deref() == Some(value.as_str()) {
                    return false;
                }
            }
            cell_text(row, &query.column).map(|t| t.to_lowercase() == needle).unwrap_or(false)
        }))
    }

    async fn insert(&self, descriptor: &ResourceDescriptor, mut values: Row) -> Result<Row, DatabaseError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(descriptor.table.to_string()).or_default();
        let next_id = rows
            .iter()
            .filter_map(|r| r.get(descriptor.primary_key).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;
        values.insert(descriptor.primary_key.to_string(), json!(next_id));
        for column in descriptor.columns {
            values.entry(column.name.to_string()).or_insert(Value::Null);
        }
        debug!("Inserted {} row {}", descriptor.table, next_id);
        rows.push(values.clone());
        Ok(values)
    }

    async fn update(&self, descriptor: &ResourceDescriptor, key: &str, values: Row) -> Result<Option<Row>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(descriptor.table) else {
            return Ok(None);
        };
        let target = rows.iter_mut().find(|row| {
            !(descriptor.soft_delete && is_deleted(row))
                && cell_text(row, descriptor.key_column).as_deref() == Some(key)
        });
        Ok(target.map(|row| {
            for (column, value) in values {
                row.insert(column, value);
            }
            row.clone()
        }))
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Rows passing the conditions and keyset, in order, without the window
fn matching<'t>(tables: &'t Tables, filter: &Filter) -> Result<Vec<&'t Row>, DatabaseError> {
    let rows = tables
        .get(filter.table_name())
        .ok_or_else(|| DatabaseError::QueryError(format!("relation \"{}\" does not exist", filter.table_name())))?;
    let order = filter.order_terms();

    let mut out: Vec<&Row> = rows
        .iter()
        .filter(|row| !(filter.excludes_deleted() && is_deleted(row)))
        .filter(|row| filter.conditions().iter().all(|c| matches_condition(tables, row, c)))
        .filter(|row| match filter.keyset() {
            None => true,
            Some(keyset) => match compare_to_anchor(row, order, &keyset.anchor) {
                Ordering::Greater => true,
                Ordering::Equal => keyset.inclusive,
                Ordering::Less => false,
            },
        })
        .collect();
    out.sort_by(|a, b| compare_rows(a, b, order));
    Ok(out)
}

fn select(tables: &Tables, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
    let rows = matching(tables, filter)?;
    let (limit, offset) = filter.window();
    let skip = offset.unwrap_or(0).max(0) as usize;
    let take = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
    Ok(rows.into_iter().skip(skip).take(take).cloned().collect())
}

fn is_deleted(row: &Row) -> bool {
    row.get("deleted_at").map(|v| !v.is_null()).unwrap_or(false)
}

fn cell_text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(scalar_text)
}

fn matches_condition(tables: &Tables, row: &Row, condition: &FilterWhereInfo) -> bool {
    match &condition.target {
        FilterTarget::Column(column) => matches_value(row.get(column), condition),
        FilterTarget::Relation { relation, column } => {
            let Some(foreign) = row.get(relation.foreign_key).filter(|v| !v.is_null()) else {
                return false;
            };
            tables
                .get(relation.table)
                .map(|related| {
                    related.iter().any(|other| {
                        other.get(relation.owner_key) == Some(foreign) && matches_value(other.get(column), condition)
                    })
                })
                .unwrap_or(false)
        }
    }
}

/// SQL three-valued logic collapsed to bool: a NULL cell never matches
fn matches_value(cell: Option<&Value>, condition: &FilterWhereInfo) -> bool {
    let Some(cell) = cell.filter(|v| !v.is_null()) else {
        return false;
    };
    match condition.operator {
        FilterOp::Like => scalar_text(cell)
            .map(|text| text.to_lowercase().contains(&condition.value.trim().to_lowercase()))
            .unwrap_or(false),
        FilterOp::In => condition.values().iter().any(|v| compare_cell(cell, v, condition) == Some(Ordering::Equal)),
        FilterOp::Notin => condition.values().iter().all(|v| matches!(compare_cell(cell, v, condition), Some(o) if o != Ordering::Equal)),
        op => match compare_cell(cell, &condition.value, condition) {
            None => false,
            Some(ordering) => match op {
                FilterOp::Eq => ordering == Ordering::Equal,
                FilterOp::Not => ordering != Ordering::Equal,
                FilterOp::Gt => ordering == Ordering::Greater,
                FilterOp::Gteq => ordering != Ordering::Less,
                FilterOp::Lt => ordering == Ordering::Less,
                FilterOp::Lteq => ordering != Ordering::Greater,
                _ => false,
            },
        },
    }
}

fn compare_cell(cell: &Value, value: &str, condition: &FilterWhereInfo) -> Option<Ordering> {
    if condition.date_only {
        let day = as_date(cell)?;
        let other = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
        return Some(day.cmp(&other));
    }
    compare_values(cell, &Value::String(value.to_string()), condition.kind)
}

/// Typed comparison of two non-null cells; `None` when either side does not
/// parse as `kind`
fn compare_values(a: &Value, b: &Value, kind: ColumnKind) -> Option<Ordering> {
    match kind {
        ColumnKind::Integer => Some(as_i64(a)?.cmp(&as_i64(b)?)),
        ColumnKind::Uuid => Some(scalar_text(a)?.to_lowercase().cmp(&scalar_text(b)?.to_lowercase())),
        ColumnKind::Text => Some(scalar_text(a)?.cmp(&scalar_text(b)?)),
        ColumnKind::Date => Some(as_date(a)?.cmp(&as_date(b)?)),
        ColumnKind::Timestamp => Some(as_timestamp(a)?.cmp(&as_timestamp(b)?)),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(text).map(|t| t.date()))
}

fn as_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?;
    parse_timestamp(text).or_else(|| {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Order of one term with NULL as the greatest value
fn compare_term(a: Option<&Value>, b: Option<&Value>, term: &FilterOrderInfo) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let ordering = match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_values(a, b, term.kind).unwrap_or(Ordering::Equal),
    };
    match term.sort {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn compare_rows(a: &Row, b: &Row, order: &[FilterOrderInfo]) -> Ordering {
    order
        .iter()
        .map(|term| compare_term(a.get(&term.column), b.get(&term.column), term))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn compare_to_anchor(row: &Row, order: &[FilterOrderInfo], anchor: &[Value]) -> Ordering {
    order
        .iter()
        .zip(anchor)
        .map(|(term, value)| compare_term(row.get(&term.column), Some(value), term))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
