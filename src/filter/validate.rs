use axum::http::StatusCode;
use serde_json::{Map, Value};
use tracing::debug;

use super::params::QueryParams;
use super::types::{is_iso_date, FilterOp, FilterOrderInfo, FilterTarget, FilterWhereInfo, SortDirection};
use crate::database::store::Store;
use crate::error::ApiError;
use crate::jsonapi::errors::{ErrorDocument, ErrorObject, RequestContext, Rule};
use crate::pagination::{PageLimits, PageRequest};
use crate::resource::{camel_case, snake_case, ColumnKind, RelationDef, ResourceDescriptor};
use crate::validation::{as_integer, is_date, is_uuid, FieldValidator};

const INCLUDE_TITLE: &str = "invalid relationships";
const SORT_TITLE: &str = "invalid sorting";
const FILTER_TITLE: &str = "invalid filtering";
const RELATION_CODE: &str = "422";

/// Index request parameters after validation
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub includes: Vec<&'static RelationDef>,
    pub sort: Vec<FilterOrderInfo>,
    pub conditions: Vec<FilterWhereInfo>,
    pub page: PageRequest,
}

/// Validate `include`, `sort`, `filter` and `page` in that order. Each phase
/// reports all of its failures at once and stops the request.
pub async fn validate_query(
    descriptor: &'static ResourceDescriptor,
    params: &QueryParams,
    context: &RequestContext,
    limits: &PageLimits,
    store: &dyn Store,
) -> Result<ValidatedQuery, ApiError> {
    let includes = validate_include(descriptor, params, context).await?;
    let sort = validate_sort(descriptor, params, context).await?;
    let conditions = validate_filter(descriptor, params, context).await?;
    let page = validate_page(descriptor, params, context, limits, store).await?;
    Ok(ValidatedQuery { includes, sort, conditions, page })
}

fn bad_request(code: &str, title: &str, detail: &str, parameter: &str) -> ErrorObject {
    ErrorObject::new(StatusCode::BAD_REQUEST, code, title, detail).with_parameter(parameter)
}

fn finish(phase: &str, errors: Vec<ErrorObject>) -> Result<(), ApiError> {
    if errors.is_empty() {
        return Ok(());
    }
    debug!("Rejected {} parameter with {} error(s)", phase, errors.len());
    Err(ApiError::validation(StatusCode::BAD_REQUEST, ErrorDocument { errors }))
}

async fn require_filled_string(params: &QueryParams, context: &RequestContext, key: &str) -> Result<Option<String>, ApiError> {
    if !params.contains(key) {
        return Ok(None);
    }
    FieldValidator::new(context, StatusCode::BAD_REQUEST)
        .validate(params.tree(), &[(key, "filled|string")])
        .await?;
    Ok(params.get(key).and_then(Value::as_str).map(str::to_string))
}

pub async fn validate_include(
    descriptor: &'static ResourceDescriptor,
    params: &QueryParams,
    context: &RequestContext,
) -> Result<Vec<&'static RelationDef>, ApiError> {
    let Some(include) = require_filled_string(params, context, "include").await? else {
        return Ok(vec![]);
    };

    let mut includes = vec![];
    let mut errors = vec![];
    for token in include.split(',').map(str::trim) {
        match descriptor.relation(&camel_case(token)) {
            Some(relation) if !token.is_empty() => {
                if !includes.iter().any(|r: &&RelationDef| r.name == relation.name) {
                    includes.push(relation);
                }
            }
            _ => errors.push(bad_request(RELATION_CODE, INCLUDE_TITLE, "relationships not exist", "include")),
        }
    }
    finish("include", errors)?;
    Ok(includes)
}

pub async fn validate_sort(
    descriptor: &ResourceDescriptor,
    params: &QueryParams,
    context: &RequestContext,
) -> Result<Vec<FilterOrderInfo>, ApiError> {
    let Some(sort) = require_filled_string(params, context, "sort").await? else {
        return Ok(vec![]);
    };

    if !descriptor.has_sortable() {
        return finish(
            "sort",
            vec![bad_request(RELATION_CODE, SORT_TITLE, "API does not support sorting parameter", "sort")],
        )
        .map(|_| vec![]);
    }

    let mut terms = vec![];
    let mut errors = vec![];
    for token in sort.split(',').map(str::trim) {
        match parse_sort_token(descriptor, token) {
            Some(term) => terms.push(term),
            None => errors.push(bad_request(RELATION_CODE, SORT_TITLE, "sorting column is invalid", "sort")),
        }
    }
    finish("sort", errors)?;
    Ok(terms)
}

/// `col`, `-col`, `table.col`, `table.-col` or `-table.col`
fn parse_sort_token(descriptor: &ResourceDescriptor, token: &str) -> Option<FilterOrderInfo> {
    let (mut desc, mut rest) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    if let Some((table, column)) = rest.split_once('.') {
        if !names_resource(descriptor, table) {
            return None;
        }
        rest = column;
        if let Some(column) = rest.strip_prefix('-') {
            if desc {
                return None;
            }
            desc = true;
            rest = column;
        }
    }
    if rest.is_empty() {
        return None;
    }
    let column = descriptor.column(&snake_case(rest)).filter(|c| c.sortable)?;
    let sort = if desc { SortDirection::Desc } else { SortDirection::Asc };
    Some(FilterOrderInfo::new(column.name, sort, column.kind))
}

fn names_resource(descriptor: &ResourceDescriptor, name: &str) -> bool {
    name == descriptor.table || name == descriptor.resource_type
}

pub async fn validate_filter(
    descriptor: &'static ResourceDescriptor,
    params: &QueryParams,
    context: &RequestContext,
) -> Result<Vec<FilterWhereInfo>, ApiError> {
    let Some(filter) = params.get("filter") else {
        return Ok(vec![]);
    };
    let code = Rule::FilteringInvalid.code();

    if !descriptor.has_filterable() {
        return finish(
            "filter",
            vec![bad_request(code, FILTER_TITLE, "API does not support filtering parameter", "filter")],
        )
        .map(|_| vec![]);
    }

    let Some(filter) = filter.as_object() else {
        let mut document = ErrorDocument::default();
        let mut error = ErrorObject::new(StatusCode::BAD_REQUEST, Rule::Array.code(), Rule::Array.title(), "The filter must be an array.");
        error.source = Some(context.source_for("filter"));
        document.push(error);
        return Err(ApiError::validation(StatusCode::BAD_REQUEST, document));
    };

    let mut conditions = vec![];
    let mut errors = vec![];
    for (key, entry) in filter {
        let operations: Vec<(String, &Value)> = match entry {
            Value::Object(ops) => ops.iter().map(|(op, v)| (op.clone(), v)).collect(),
            other => vec![(FilterOp::Eq.as_str().to_string(), other)],
        };
        let Some(resolved) = resolve_filter_key(descriptor, key) else {
            errors.push(bad_request(code, FILTER_TITLE, "filter column is invalid", "filter"));
            continue;
        };

        for (op_name, raw) in operations {
            let parameter = format!("filter/{}/{}", key, op_name);
            let Some(operator) = FilterOp::parse(&op_name) else {
                errors.push(bad_request(code, FILTER_TITLE, "filtering operators is invalid", &parameter));
                continue;
            };
            let value = match raw {
                Value::String(s) if s.trim().is_empty() => {
                    errors.push(bad_request(code, FILTER_TITLE, "the filter field must have a value.", &parameter));
                    continue;
                }
                Value::String(s) => s.clone(),
                _ => {
                    errors.push(bad_request(code, FILTER_TITLE, "filter value is invalid", &parameter));
                    continue;
                }
            };

            let (target, kind) = resolved.target_for(&value);
            let condition = FilterWhereInfo::new(target, operator, value, kind);
            if operator != FilterOp::Like && !condition.values().iter().all(|v| value_fits(kind, v)) {
                errors.push(bad_request(code, FILTER_TITLE, "filter value is invalid", &parameter));
                continue;
            }
            if operator.is_set() && condition.values().is_empty() {
                errors.push(bad_request(code, FILTER_TITLE, "the filter field must have a value.", &parameter));
                continue;
            }
            conditions.push(condition);
        }
    }
    finish("filter", errors)?;
    Ok(conditions)
}

/// What a filter key addresses, before the value is known
enum ResolvedKey {
    Column(&'static str, ColumnKind),
    RelationId(&'static RelationDef),
    RelationName(&'static RelationDef),
}

impl ResolvedKey {
    fn target_for(&self, value: &str) -> (FilterTarget, ColumnKind) {
        match self {
            ResolvedKey::Column(name, kind) => (FilterTarget::Column(name.to_string()), *kind),
            ResolvedKey::RelationId(relation) => {
                let first = value.split(',').next().unwrap_or(value).trim();
                let (column, kind) = if is_uuid(first) { ("uuid", ColumnKind::Uuid) } else { (relation.owner_key, ColumnKind::Integer) };
                (FilterTarget::Relation { relation, column: column.to_string() }, kind)
            }
            ResolvedKey::RelationName(relation) => (
                FilterTarget::Relation { relation, column: relation.name_column.to_string() },
                ColumnKind::Text,
            ),
        }
    }
}

fn resolve_filter_key(descriptor: &'static ResourceDescriptor, key: &str) -> Option<ResolvedKey> {
    let filterable = |name: &str| {
        descriptor
            .column(&snake_case(name))
            .filter(|c| c.filterable)
            .map(|c| ResolvedKey::Column(c.name, c.kind))
    };

    match key.split_once('.') {
        None => filterable(key).or_else(|| descriptor.relation(&camel_case(key)).map(ResolvedKey::RelationId)),
        Some((prefix, column)) if names_resource(descriptor, prefix) => filterable(column),
        Some((prefix, suffix)) => {
            let relation = descriptor.relation(&camel_case(prefix))?;
            match suffix {
                "id" => Some(ResolvedKey::RelationId(relation)),
                "name" => Some(ResolvedKey::RelationName(relation)),
                _ => None,
            }
        }
    }
}

fn value_fits(kind: ColumnKind, value: &str) -> bool {
    match kind {
        ColumnKind::Text => true,
        ColumnKind::Integer => as_integer(&Value::String(value.to_string())).is_some(),
        ColumnKind::Uuid => is_uuid(value),
        ColumnKind::Date => is_iso_date(value),
        ColumnKind::Timestamp => is_date(value),
    }
}

pub async fn validate_page(
    descriptor: &ResourceDescriptor,
    params: &QueryParams,
    context: &RequestContext,
    limits: &PageLimits,
    store: &dyn Store,
) -> Result<PageRequest, ApiError> {
    let Some(page) = params.get("page") else {
        return Ok(PageRequest::default_for(limits));
    };

    FieldValidator::new(context, StatusCode::BAD_REQUEST)
        .validate(params.tree(), &[("page", "array")])
        .await?;
    let empty = Map::new();
    let page = page.as_object().unwrap_or(&empty);

    let identifier = format!("filled|string|uuid|exists:{},{}", descriptor.table, descriptor.key_column);
    let rules = [
        ("number", "filled|integer|gt:0"),
        ("size", "filled|integer|gt:0|required_with:number,after,before"),
        ("offset", "filled|integer|gt:0"),
        ("limit", "filled|integer|gt:0|required_with:offset"),
        ("after", identifier.as_str()),
        ("before", identifier.as_str()),
    ];
    FieldValidator::new(context, StatusCode::BAD_REQUEST)
        .prefixed("page.")
        .with_store(store)
        .validate(page, &rules)
        .await?;

    let int = |key: &str| page.get(key).and_then(as_integer);
    let text = |key: &str| page.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(PageRequest::from_parts(
        limits,
        int("number"),
        int("size"),
        int("offset"),
        int("limit"),
        text("after"),
        text("before"),
    ))
}
