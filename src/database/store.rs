use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::database::manager::DatabaseError;
use crate::filter::Filter;
use crate::pagination::cursor::{CursorRequest, CursorWindow};
use crate::resource::ResourceDescriptor;

/// One table row as a JSON object keyed by column name
pub type Row = Map<String, Value>;

/// Timestamps are written the way `row_to_json` renders `timestamp` columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn now_timestamp() -> Value {
    Value::String(chrono::Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string())
}

/// Case-insensitive existence probe used by `unique`/`exists` rules
#[derive(Debug, Clone)]
pub struct ExistsQuery {
    pub table: String,
    pub column: String,
    pub value: String,
    /// Skip rows whose `(column, value)` matches, e.g. the row being updated
    pub ignore: Option<(String, String)>,
    /// Skip rows with `deleted_at` set
    pub soft_delete: bool,
}

impl ExistsQuery {
    pub fn new(table: impl Into<String>, column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            value: value.into(),
            ignore: None,
            soft_delete: true,
        }
    }

    pub fn ignoring(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.ignore = Some((column.into(), value.into()));
        self
    }
}

/// Read access used by the multi-query pagination steps. Implemented by a
/// store snapshot or an open read-only transaction.
#[async_trait]
pub trait RowSource: Send {
    async fn count_rows(&mut self, filter: &Filter) -> Result<i64, DatabaseError>;
    async fn fetch_rows(&mut self, filter: &Filter) -> Result<Vec<Row>, DatabaseError>;
}

/// Row-oriented data store behind the repository
#[async_trait]
pub trait Store: Send + Sync {
    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError>;

    async fn fetch(&self, filter: &Filter) -> Result<Vec<Row>, DatabaseError>;

    /// Compute a cursor page against one consistent snapshot
    async fn cursor_window(&self, filter: &Filter, request: &CursorRequest) -> Result<CursorWindow, DatabaseError>;

    async fn exists(&self, query: &ExistsQuery) -> Result<bool, DatabaseError>;

    /// Insert `values` and return the stored row
    async fn insert(&self, descriptor: &ResourceDescriptor, values: Row) -> Result<Row, DatabaseError>;

    /// Update the live row whose key column equals `key`; `None` when absent
    async fn update(&self, descriptor: &ResourceDescriptor, key: &str, values: Row) -> Result<Option<Row>, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}
