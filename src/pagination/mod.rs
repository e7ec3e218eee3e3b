//! Page-number, offset and keyset pagination over a `Store`.

pub mod cursor;
pub mod page;

use serde_json::{json, Value};

use crate::config::ApiConfig;
use crate::database::manager::DatabaseError;
use crate::database::store::{Row, Store};
use crate::filter::Filter;
use crate::resource::ResourceDescriptor;
use cursor::{CursorMeta, CursorRequest};

#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_size: i64,
    pub max_size: i64,
}

impl From<&ApiConfig> for PageLimits {
    fn from(api: &ApiConfig) -> Self {
        Self { default_size: api.default_page_size, max_size: api.max_page_size }
    }
}

/// Requested slice of a collection
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    Page { number: i64, size: i64 },
    Offset { offset: i64, limit: i64 },
    Cursor { size: i64, after: Option<String>, before: Option<String> },
}

impl PageRequest {
    pub fn default_for(limits: &PageLimits) -> Self {
        PageRequest::Page { number: 1, size: limits.default_size }
    }

    /// Pick the strategy from validated `page[...]` values: `after`/`before`
    /// first, then `offset`/`limit`, then `number`/`size`, else the default
    pub fn from_parts(
        limits: &PageLimits,
        number: Option<i64>,
        size: Option<i64>,
        offset: Option<i64>,
        limit: Option<i64>,
        after: Option<String>,
        before: Option<String>,
    ) -> Self {
        let cap = |n: i64| n.clamp(1, limits.max_size);
        let size = size.map(cap).unwrap_or(limits.default_size);

        if after.is_some() || before.is_some() {
            let before = if after.is_some() { None } else { before };
            return PageRequest::Cursor { size, after, before };
        }
        if offset.is_some() || limit.is_some() {
            return PageRequest::Offset {
                offset: offset.unwrap_or(0).max(0),
                limit: limit.map(cap).unwrap_or(limits.default_size),
            };
        }
        PageRequest::Page { number: number.unwrap_or(1).max(1), size }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageMeta {
    Page { total: i64, count: i64, per_page: i64, current_page: i64, total_pages: i64 },
    Offset { total: i64, count: i64, limit: i64, offset: i64 },
    Cursor(CursorMeta),
}

impl PageMeta {
    /// `meta` member of the response document
    pub fn to_json(&self) -> Value {
        match self {
            PageMeta::Page { total, count, per_page, current_page, total_pages } => json!({
                "pagination": {
                    "total": total,
                    "count": count,
                    "perPage": per_page,
                    "currentPage": current_page,
                    "totalPages": total_pages,
                }
            }),
            PageMeta::Offset { total, count, limit, offset } => json!({
                "pagination": {
                    "total": total,
                    "count": count,
                    "limit": limit,
                    "offset": offset,
                }
            }),
            PageMeta::Cursor(cursor) => json!({ "cursor": cursor }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub rows: Vec<Row>,
    pub meta: PageMeta,
}

/// Run `request` against `filter` (conditions and a total order, no window)
pub async fn paginate(
    store: &dyn Store,
    filter: &Filter,
    request: &PageRequest,
    descriptor: &ResourceDescriptor,
) -> Result<Page, DatabaseError> {
    match request {
        PageRequest::Page { number, size } => page::by_number(store, filter, *number, *size).await,
        PageRequest::Offset { offset, limit } => page::by_offset(store, filter, *offset, *limit).await,
        PageRequest::Cursor { size, after, before } => {
            let request = CursorRequest {
                size: *size,
                after: after.clone(),
                before: before.clone(),
                key_column: descriptor.key_column.to_string(),
                key_kind: descriptor.kind_of(descriptor.key_column),
            };
            let window = store.cursor_window(filter, &request).await?;
            Ok(Page { rows: window.rows, meta: PageMeta::Cursor(window.meta) })
        }
    }
}
