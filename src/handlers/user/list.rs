// handlers/user/list.rs - GET /user handler

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::app::AppState;
use crate::database::models::UserTransformer;
use crate::database::manager::DatabaseError;
use crate::database::store::Row;
use crate::database::Repository;
use crate::filter::{validate_query, QueryParams};
use crate::handlers::request_context;
use crate::jsonapi::{Included, Serializer};
use crate::middleware::{ApiResponse, ApiResult};
use crate::resource::RelationDef;

/// GET /user - include → sort → filter → page, then a paginated collection
pub async fn user_list(State(state): State<AppState>, method: Method, uri: Uri, headers: HeaderMap) -> ApiResult {
    let context = request_context(&method, &uri);
    let params = QueryParams::parse(uri.query());
    let query = validate_query(
        state.users.descriptor(),
        &params,
        &context,
        &state.page_limits(),
        state.store.as_ref(),
    )
    .await?;

    let page = state.users.select_page(&query).await?;
    let included = load_included(&state.users, &query.includes, &page.rows).await?;

    let links = state.links(&headers);
    let transformer = UserTransformer::user();
    let document = Serializer::new(&links, &transformer).paginated(&page, &params, &included);
    Ok(ApiResponse::success(document))
}

/// Related rows for each requested relation, keyed by foreign key value
async fn load_included(
    users: &Repository,
    relations: &[&'static RelationDef],
    rows: &[Row],
) -> Result<Vec<Included>, DatabaseError> {
    let mut included = vec![];
    for &relation in relations {
        let keys: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| match row.get(relation.foreign_key)? {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect();
        let keys: Vec<String> = keys.into_iter().collect();

        let related: HashMap<String, Row> = users
            .select_in(relation.owner_key, &keys)
            .await?
            .into_iter()
            .filter_map(|row| {
                let key = match row.get(relation.owner_key)? {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key, row))
            })
            .collect();
        included.push(Included { relation, rows: related });
    }
    Ok(included)
}
