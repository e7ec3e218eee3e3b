use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{validate_identifier, FilterWhere, MAIN_ALIAS};
use super::types::{FilterOrderInfo, FilterWhereInfo, FilterWhereOptions, Keyset, SqlResult};
use crate::resource::ResourceDescriptor;

/// Query plan for one resource table: conditions, order, keyset bound and
/// window. Rendered to SQL by the PostgreSQL store and evaluated directly by
/// the in-memory store.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    soft_delete: bool,
    conditions: Vec<FilterWhereInfo>,
    order_data: Vec<FilterOrderInfo>,
    keyset: Option<Keyset>,
    limit: Option<i64>,
    offset: Option<i64>,
    options: FilterWhereOptions,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        validate_identifier(&table_name).map_err(|_| FilterError::InvalidTableName(table_name.clone()))?;
        Ok(Self {
            table_name,
            soft_delete: false,
            conditions: vec![],
            order_data: vec![],
            keyset: None,
            limit: None,
            offset: None,
            options: FilterWhereOptions::default(),
        })
    }

    pub fn for_resource(descriptor: &ResourceDescriptor) -> Result<Self, FilterError> {
        let mut filter = Self::new(descriptor.table)?;
        filter.soft_delete = descriptor.soft_delete;
        Ok(filter)
    }

    pub fn where_clause(&mut self, conditions: Vec<FilterWhereInfo>) -> &mut Self {
        self.conditions = conditions;
        self
    }

    pub fn order(&mut self, order: Vec<FilterOrderInfo>) -> &mut Self {
        self.order_data = order;
        self
    }

    /// Restrict to rows after `anchor` in the current order
    pub fn after(&mut self, anchor: Vec<Value>, inclusive: bool) -> Result<&mut Self, FilterError> {
        if anchor.len() != self.order_data.len() {
            return Err(FilterError::KeysetMismatch(anchor.len(), self.order_data.len()));
        }
        self.keyset = Some(Keyset { anchor, inclusive });
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn include_deleted(&mut self, include: bool) -> &mut Self {
        self.options.include_deleted = include;
        self
    }

    /// Same conditions and order without keyset or window
    pub fn unbounded(&self) -> Self {
        Self { keyset: None, limit: None, offset: None, ..self.clone() }
    }

    /// Same table and order with `conditions` replacing the current ones
    pub fn with_conditions(&self, conditions: Vec<FilterWhereInfo>) -> Self {
        Self { conditions, ..self.unbounded() }
    }

    /// Same conditions with every order term flipped, without keyset or window
    pub fn reversed(&self) -> Self {
        Self { order_data: FilterOrder::reversed(&self.order_data), ..self.unbounded() }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn conditions(&self) -> &[FilterWhereInfo] {
        &self.conditions
    }

    pub fn order_terms(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn keyset(&self) -> Option<&Keyset> {
        self.keyset.as_ref()
    }

    pub fn window(&self) -> (Option<i64>, Option<i64>) {
        (self.limit, self.offset)
    }

    /// Whether soft-deleted rows are filtered out
    pub fn excludes_deleted(&self) -> bool {
        self.soft_delete && !self.options.include_deleted
    }

    /// Row values of the order columns, used as a keyset anchor
    pub fn anchor_of(&self, row: &serde_json::Map<String, Value>) -> Vec<Value> {
        self.order_data
            .iter()
            .map(|t| row.get(&t.column).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data)?;
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT row_to_json(\"{}\") AS row", MAIN_ALIAS),
            self.from_clause(),
            format!("WHERE {}", where_result.query),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let keyset = self.keyset.as_ref().map(|k| (self.order_data.as_slice(), k));
        let (query, params) = FilterWhere::generate(&self.conditions, keyset, self.soft_delete, &self.options)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = format!("SELECT COUNT(*) AS count {} WHERE {}", self.from_clause(), where_result.query);
        Ok(SqlResult { query, params: where_result.params })
    }

    fn from_clause(&self) -> String {
        format!("FROM \"{}\" AS \"{}\"", self.table_name, MAIN_ALIAS)
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
