use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::database::manager::DatabaseError;
use crate::database::store::{now_timestamp, Row, Store};
use crate::filter::{Filter, FilterOp, FilterOrder, FilterTarget, FilterWhereInfo, ValidatedQuery};
use crate::pagination::{paginate, Page};
use crate::resource::ResourceDescriptor;

/// Resource-scoped access to a `Store`
#[derive(Clone)]
pub struct Repository {
    descriptor: &'static ResourceDescriptor,
    store: Arc<dyn Store>,
}

impl Repository {
    pub fn new(descriptor: &'static ResourceDescriptor, store: Arc<dyn Store>) -> Self {
        Self { descriptor, store }
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        self.descriptor
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Translate a validated index query and paginate it
    pub async fn select_page(&self, query: &ValidatedQuery) -> Result<Page, DatabaseError> {
        let mut filter = Filter::for_resource(self.descriptor)?;
        filter
            .where_clause(query.conditions.clone())
            .order(FilterOrder::resolve(query.sort.clone(), self.descriptor));
        paginate(self.store(), &filter, &query.page, self.descriptor).await
    }

    /// Live row whose key column equals `key`
    pub async fn select_one(&self, key: &str) -> Result<Option<Row>, DatabaseError> {
        self.select_by(self.descriptor.key_column, key).await
    }

    pub async fn select_by(&self, column: &str, value: &str) -> Result<Option<Row>, DatabaseError> {
        let mut filter = Filter::for_resource(self.descriptor)?;
        filter
            .where_clause(vec![FilterWhereInfo::new(
                FilterTarget::Column(column.to_string()),
                FilterOp::Eq,
                value,
                self.descriptor.kind_of(column),
            )])
            .limit(1, None)?;
        Ok(self.store.fetch(&filter).await?.into_iter().next())
    }

    /// Live rows whose `column` is one of `values`
    pub async fn select_in(&self, column: &str, values: &[String]) -> Result<Vec<Row>, DatabaseError> {
        if values.is_empty() {
            return Ok(vec![]);
        }
        let mut filter = Filter::for_resource(self.descriptor)?;
        filter.where_clause(vec![FilterWhereInfo::new(
            FilterTarget::Column(column.to_string()),
            FilterOp::In,
            values.join(","),
            self.descriptor.kind_of(column),
        )]);
        self.store.fetch(&filter).await
    }

    pub async fn select_404(&self, key: &str) -> Result<Row, DatabaseError> {
        self.select_one(key)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", self.descriptor.resource_type, key)))
    }

    /// Insert with `created_at`/`updated_at` stamped
    pub async fn create(&self, mut values: Row) -> Result<Row, DatabaseError> {
        let now = now_timestamp();
        values.insert("created_at".into(), now.clone());
        values.insert("updated_at".into(), now);
        let row = self.store.insert(self.descriptor, values).await?;
        debug!("Created {} {}", self.descriptor.resource_type, key_of(self.descriptor, &row));
        Ok(row)
    }

    /// Partial update with `updated_at` stamped; `None` when the row is gone
    pub async fn update(&self, key: &str, mut values: Row) -> Result<Option<Row>, DatabaseError> {
        values.insert("updated_at".into(), now_timestamp());
        self.store.update(self.descriptor, key, values).await
    }

    /// Mark the row deleted; `false` when it was already gone
    pub async fn delete(&self, key: &str, deleted_by: Option<i64>) -> Result<bool, DatabaseError> {
        let mut values = Row::new();
        values.insert("deleted_at".into(), now_timestamp());
        if let Some(id) = deleted_by {
            values.insert("deleted_by".into(), Value::from(id));
        }
        let deleted = self.store.update(self.descriptor, key, values).await?.is_some();
        debug!("Deleted {} {}: {}", self.descriptor.resource_type, key, deleted);
        Ok(deleted)
    }
}

fn key_of(descriptor: &ResourceDescriptor, row: &Row) -> String {
    row.get(descriptor.key_column).and_then(Value::as_str).unwrap_or_default().to_string()
}
