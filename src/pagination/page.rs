use tracing::debug;

use super::{Page, PageMeta};
use crate::database::manager::DatabaseError;
use crate::database::store::Store;
use crate::filter::Filter;

pub fn total_pages(total: i64, size: i64) -> i64 {
    if size <= 0 {
        return 0;
    }
    (total + size - 1) / size
}

pub async fn by_number(store: &dyn Store, filter: &Filter, number: i64, size: i64) -> Result<Page, DatabaseError> {
    let total = store.count(filter).await?;
    let mut window = filter.unbounded();
    window.limit(size, Some((number - 1).saturating_mul(size)))?;
    let rows = store.fetch(&window).await?;
    debug!("Page {} of size {}: {} of {} rows", number, size, rows.len(), total);

    Ok(Page {
        meta: PageMeta::Page {
            total,
            count: rows.len() as i64,
            per_page: size,
            current_page: number,
            total_pages: total_pages(total, size),
        },
        rows,
    })
}

pub async fn by_offset(store: &dyn Store, filter: &Filter, offset: i64, limit: i64) -> Result<Page, DatabaseError> {
    let total = store.count(filter).await?;
    let mut window = filter.unbounded();
    window.limit(limit, Some(offset))?;
    let rows = store.fetch(&window).await?;

    Ok(Page {
        meta: PageMeta::Offset { total, count: rows.len() as i64, limit, offset },
        rows,
    })
}
