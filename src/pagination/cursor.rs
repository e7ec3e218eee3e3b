use serde::Serialize;

use crate::database::manager::DatabaseError;
use crate::database::store::{Row, RowSource};
use crate::filter::{Filter, FilterOp, FilterTarget, FilterWhereInfo};
use crate::resource::ColumnKind;
use crate::validation::scalar_text;

#[derive(Debug, Clone, PartialEq)]
pub struct CursorRequest {
    pub size: i64,
    pub after: Option<String>,
    pub before: Option<String>,
    /// Column holding the public identifier used as cursor value
    pub key_column: String,
    pub key_kind: ColumnKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CursorMeta {
    pub current: Option<String>,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
    pub count: i64,
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct CursorWindow {
    pub rows: Vec<Row>,
    pub meta: CursorMeta,
}

/// Keyset page of `filter` (conditions plus a total order).
///
/// The page holds the anchor row and the rows following it, fetched as
/// `size + 1` rows so the extra row becomes `next`. `previous` is the
/// earliest of the `size` rows preceding the anchor, `first` and `last` the
/// anchors of the outermost pages. `first`/`last` are null when they equal
/// `current`.
pub async fn window<S: RowSource + ?Sized>(
    source: &mut S,
    filter: &Filter,
    request: &CursorRequest,
) -> Result<CursorWindow, DatabaseError> {
    let base = filter.unbounded();
    let size = request.size.max(1);
    let key = |row: &Row| row.get(&request.key_column).and_then(scalar_text);

    let total = source.count_rows(&base).await?;

    let anchor_row = match (&request.after, &request.before) {
        (Some(after), _) => lookup(source, &base, request, after).await?,
        (None, Some(before)) => match lookup(source, &base, request, before).await? {
            Some(row) => {
                let mut preceding = base.reversed();
                let anchor = preceding.anchor_of(&row);
                preceding.after(anchor, false)?.limit(size, None)?;
                match source.fetch_rows(&preceding).await?.pop() {
                    Some(anchor_row) => Some(anchor_row),
                    // Nothing precedes the first row: an empty page leading into it
                    None => {
                        let (first, last) = outer_anchors(source, &base, request).await?;
                        let meta = CursorMeta { first, last, next: key(&row), total, ..CursorMeta::default() };
                        return Ok(CursorWindow { rows: vec![], meta });
                    }
                }
            }
            None => None,
        },
        (None, None) => None,
    };
    let anchor_row = match anchor_row {
        Some(row) => Some(row),
        None => first_row(source, &base).await?,
    };
    let Some(anchor_row) = anchor_row else {
        return Ok(CursorWindow { rows: vec![], meta: CursorMeta { total, ..CursorMeta::default() } });
    };

    let anchor = base.anchor_of(&anchor_row);
    let current = key(&anchor_row);

    let mut forward = base.clone();
    forward.after(anchor.clone(), true)?.limit(size + 1, None)?;
    let mut rows = source.fetch_rows(&forward).await?;
    let next = if rows.len() as i64 > size {
        rows.truncate(size as usize + 1);
        rows.pop().and_then(|row| key(&row))
    } else {
        None
    };

    let mut backward = base.reversed();
    backward.after(anchor, false)?.limit(size, None)?;
    let previous = source.fetch_rows(&backward).await?.last().and_then(|row| key(row));

    let (first, last) = outer_anchors(source, &base, request).await?;

    let meta = CursorMeta {
        first: first.filter(|f| Some(f) != current.as_ref()),
        last: last.filter(|l| Some(l) != current.as_ref()),
        current,
        previous,
        next,
        count: rows.len() as i64,
        total,
    };
    Ok(CursorWindow { rows, meta })
}

/// Row by identifier, regardless of the filter conditions
async fn lookup<S: RowSource + ?Sized>(
    source: &mut S,
    base: &Filter,
    request: &CursorRequest,
    identifier: &str,
) -> Result<Option<Row>, DatabaseError> {
    let condition = FilterWhereInfo::new(
        FilterTarget::Column(request.key_column.clone()),
        FilterOp::Eq,
        identifier,
        request.key_kind,
    );
    let mut by_key = base.with_conditions(vec![condition]);
    by_key.limit(1, None)?;
    Ok(source.fetch_rows(&by_key).await?.into_iter().next())
}

/// Identifiers anchoring the first and the last page
async fn outer_anchors<S: RowSource + ?Sized>(
    source: &mut S,
    base: &Filter,
    request: &CursorRequest,
) -> Result<(Option<String>, Option<String>), DatabaseError> {
    let key = |row: &Row| row.get(&request.key_column).and_then(scalar_text);
    let first = first_row(source, base).await?.and_then(|row| key(&row));

    let mut tail = base.reversed();
    tail.limit(request.size.max(1), None)?;
    let last = source.fetch_rows(&tail).await?.last().and_then(key);
    Ok((first, last))
}

async fn first_row<S: RowSource + ?Sized>(source: &mut S, base: &Filter) -> Result<Option<Row>, DatabaseError> {
    let mut head = base.unbounded();
    head.limit(1, None)?;
    Ok(source.fetch_rows(&head).await?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::models::user::USER_RESOURCE;
    use crate::database::store::Store;
    use crate::filter::FilterOrder;
    use crate::testing::fixture_uuid;

    fn newest_first() -> Filter {
        let mut filter = Filter::for_resource(&USER_RESOURCE).unwrap();
        filter.order(FilterOrder::resolve(vec![], &USER_RESOURCE));
        filter
    }

    fn request(size: i64, after: Option<String>, before: Option<String>) -> CursorRequest {
        CursorRequest { size, after, before, key_column: "uuid".into(), key_kind: ColumnKind::Uuid }
    }

    fn uuids(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r["uuid"].as_str().unwrap_or_default().to_string()).collect()
    }

    #[tokio::test]
    async fn starts_from_the_first_row() {
        let store = MemoryStore::seeded_users(5);
        let w = store.cursor_window(&newest_first(), &request(2, None, None)).await.unwrap();
        assert_eq!(uuids(&w.rows), vec![fixture_uuid(5), fixture_uuid(4)]);
        assert_eq!(
            w.meta,
            CursorMeta {
                current: Some(fixture_uuid(5)),
                previous: None,
                next: Some(fixture_uuid(3)),
                first: None,
                last: Some(fixture_uuid(2)),
                count: 2,
                total: 5,
            }
        );
    }

    #[tokio::test]
    async fn pages_after_an_anchor() {
        let store = MemoryStore::seeded_users(5);
        let w = store.cursor_window(&newest_first(), &request(2, Some(fixture_uuid(3)), None)).await.unwrap();
        assert_eq!(uuids(&w.rows), vec![fixture_uuid(3), fixture_uuid(2)]);
        assert_eq!(w.meta.current, Some(fixture_uuid(3)));
        assert_eq!(w.meta.previous, Some(fixture_uuid(5)));
        assert_eq!(w.meta.next, Some(fixture_uuid(1)));
        assert_eq!(w.meta.first, Some(fixture_uuid(5)));
        assert_eq!(w.meta.last, Some(fixture_uuid(2)));
    }

    #[tokio::test]
    async fn last_page_has_no_next() {
        let store = MemoryStore::seeded_users(5);
        let w = store.cursor_window(&newest_first(), &request(2, Some(fixture_uuid(1)), None)).await.unwrap();
        assert_eq!(uuids(&w.rows), vec![fixture_uuid(1)]);
        assert_eq!(w.meta.next, None);
        assert_eq!(w.meta.count, 1);
    }

    #[tokio::test]
    async fn next_then_previous_returns_to_the_anchor() {
        let store = MemoryStore::seeded_users(9);
        let filter = newest_first();
        let mut anchor = fixture_uuid(8);
        for _ in 0..3 {
            let here = store.cursor_window(&filter, &request(2, Some(anchor.clone()), None)).await.unwrap();
            let Some(next) = here.meta.next.clone() else { break };
            let there = store.cursor_window(&filter, &request(2, Some(next.clone()), None)).await.unwrap();
            assert_eq!(there.meta.previous, Some(anchor.clone()));
            anchor = next;
        }
    }

    #[tokio::test]
    async fn before_yields_the_preceding_page() {
        let store = MemoryStore::seeded_users(5);
        let w = store.cursor_window(&newest_first(), &request(2, None, Some(fixture_uuid(3)))).await.unwrap();
        assert_eq!(uuids(&w.rows), vec![fixture_uuid(5), fixture_uuid(4)]);
        assert_eq!(w.meta.next, Some(fixture_uuid(3)));
    }

    #[tokio::test]
    async fn before_the_first_row_is_an_empty_page() {
        let store = MemoryStore::seeded_users(5);
        let w = store.cursor_window(&newest_first(), &request(2, None, Some(fixture_uuid(5)))).await.unwrap();
        assert!(w.rows.is_empty());
        assert_eq!(
            w.meta,
            CursorMeta {
                current: None,
                previous: None,
                next: Some(fixture_uuid(5)),
                first: Some(fixture_uuid(5)),
                last: Some(fixture_uuid(2)),
                count: 0,
                total: 5,
            }
        );
    }

    #[tokio::test]
    async fn empty_result_has_only_total() {
        let store = MemoryStore::seeded_users(0);
        let w = store.cursor_window(&newest_first(), &request(2, None, None)).await.unwrap();
        assert!(w.rows.is_empty());
        assert_eq!(w.meta, CursorMeta::default());
    }

    #[tokio::test]
    async fn ties_are_broken_by_primary_key() {
        let store = MemoryStore::seeded_users(4);
        store.set_column("user", "created_at", serde_json::json!("2024-01-01T00:00:00")).await;
        let filter = newest_first();
        let first = store.cursor_window(&filter, &request(2, None, None)).await.unwrap();
        assert_eq!(uuids(&first.rows), vec![fixture_uuid(1), fixture_uuid(2)]);
        let next = first.meta.next.clone();
        let second = store.cursor_window(&filter, &request(2, next, None)).await.unwrap();
        assert_eq!(uuids(&second.rows), vec![fixture_uuid(3), fixture_uuid(4)]);
        assert_eq!(second.meta.previous, Some(fixture_uuid(1)));
    }
}
