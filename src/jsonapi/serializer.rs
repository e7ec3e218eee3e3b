// JSON:API documents for single rows, collections and pages
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::links::LinkBuilder;
use crate::database::store::Row;
use crate::filter::QueryParams;
use crate::pagination::{Page, PageMeta};
use crate::resource::{kebab_case, RelationDef};

/// Maps a stored row onto a JSON:API resource object
pub trait Transformer {
    fn resource_type(&self) -> &str;

    /// URL segment of the resource
    fn url(&self) -> &str;

    fn id(&self, row: &Row) -> String;

    /// Whether the self link ends in the identifier (`/user/{id}` vs `/auth`)
    fn self_link_has_id(&self) -> bool {
        true
    }

    /// Relations that get `self`/`related` links on every resource
    fn relations(&self) -> &'static [RelationDef] {
        &[]
    }

    fn attributes(&self, row: &Row) -> Map<String, Value>;
}

/// Related rows loaded for `include`, keyed by the foreign key value
#[derive(Debug, Clone)]
pub struct Included {
    pub relation: &'static RelationDef,
    pub rows: HashMap<String, Row>,
}

pub struct Serializer<'a> {
    links: &'a LinkBuilder,
    transformer: &'a dyn Transformer,
}

impl<'a> Serializer<'a> {
    pub fn new(links: &'a LinkBuilder, transformer: &'a dyn Transformer) -> Self {
        Self { links, transformer }
    }

    pub fn item(&self, row: &Row) -> Value {
        json!({ "data": self.resource(row, &[]) })
    }

    pub fn collection(&self, rows: &[Row]) -> Value {
        json!({ "data": rows.iter().map(|r| self.resource(r, &[])).collect::<Vec<_>>() })
    }

    /// Page of rows with `meta` and `links`, plus `included` when relations
    /// were requested
    pub fn paginated(&self, page: &Page, params: &QueryParams, included: &[Included]) -> Value {
        let data: Vec<Value> = page.rows.iter().map(|r| self.resource(r, included)).collect();
        let mut document = Map::new();
        document.insert("data".into(), Value::Array(data));
        if !included.is_empty() {
            document.insert("included".into(), Value::Array(self.included(&page.rows, included)));
        }
        document.insert("meta".into(), page.meta.to_json());
        document.insert("links".into(), self.page_links(&page.meta, params));
        Value::Object(document)
    }

    pub fn resource(&self, row: &Row, included: &[Included]) -> Value {
        let t = self.transformer;
        let id = t.id(row);
        let self_link = if t.self_link_has_id() {
            self.links.resource(t.url(), Some(&id))
        } else {
            self.links.resource(t.url(), None)
        };

        let mut resource = Map::new();
        resource.insert("type".into(), Value::String(t.resource_type().to_string()));
        resource.insert("id".into(), Value::String(id.clone()));
        resource.insert("attributes".into(), Value::Object(t.attributes(row)));
        resource.insert("links".into(), json!({ "self": self_link }));

        let relationships = self.relationships(t.resource_type(), &id, row, included);
        if !relationships.is_empty() {
            resource.insert("relationships".into(), Value::Object(relationships));
        }
        Value::Object(resource)
    }

    fn relationships(&self, resource_type: &str, id: &str, row: &Row, included: &[Included]) -> Map<String, Value> {
        let base = self.links.base();
        let kind = kebab_case(resource_type);
        self.transformer
            .relations()
            .iter()
            .map(|relation| {
                let name = kebab_case(relation.name);
                let mut member = Map::new();
                member.insert(
                    "links".into(),
                    json!({
                        "self": format!("{}/{}/{}/relationships/{}", base, kind, id, name),
                        "related": format!("{}/{}/{}/{}", base, kind, id, name),
                    }),
                );
                if let Some(loaded) = included.iter().find(|i| i.relation.name == relation.name) {
                    let data = related_row(loaded, row)
                        .map(|r| json!({ "type": relation.resource_type, "id": self.transformer.id(r) }))
                        .unwrap_or(Value::Null);
                    member.insert("data".into(), data);
                }
                (relation.name.to_string(), Value::Object(member))
            })
            .collect()
    }

    fn included(&self, rows: &[Row], included: &[Included]) -> Vec<Value> {
        let mut seen: Vec<(String, String)> = vec![];
        let mut out = vec![];
        for row in rows {
            for loaded in included {
                let Some(related) = related_row(loaded, row) else {
                    continue;
                };
                let key = (loaded.relation.resource_type.to_string(), self.transformer.id(related));
                if seen.contains(&key) {
                    continue;
                }
                seen.push(key);
                out.push(self.resource(related, &[]));
            }
        }
        out
    }

    fn page_links(&self, meta: &PageMeta, params: &QueryParams) -> Value {
        let url = self.transformer.url();
        match meta {
            PageMeta::Page { per_page, current_page, total_pages, .. } => {
                let link = |number: i64| {
                    self.links.with_query(
                        url,
                        params,
                        &[("page[number]", number.to_string()), ("page[size]", per_page.to_string())],
                    )
                };
                let last = (*total_pages).max(1);
                json!({
                    "self": link(*current_page),
                    "first": link(1),
                    "prev": (*current_page > 1).then(|| link(current_page - 1)),
                    "next": (*current_page < *total_pages).then(|| link(current_page + 1)),
                    "last": link(last),
                })
            }
            PageMeta::Offset { .. } | PageMeta::Cursor(_) => {
                json!({ "self": self.links.with_query(url, params, &[]) })
            }
        }
    }
}

fn related_row<'r>(loaded: &'r Included, row: &Row) -> Option<&'r Row> {
    let key = match row.get(loaded.relation.foreign_key)? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    loaded.rows.get(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::memory::MemoryStore;
    use crate::database::models::{UserTransformer, USER_RESOURCE};
    use crate::pagination::PageMeta;
    use crate::testing::fixture_uuid;

    async fn rows(count: i64) -> Vec<Row> {
        MemoryStore::seeded_users(count).rows("user").await
    }

    fn links() -> LinkBuilder {
        LinkBuilder::new(&AppConfig::development().api, Some("http://localhost"))
    }

    #[tokio::test]
    async fn item_has_type_id_attributes_and_links() {
        let rows = rows(1).await;
        let links = links();
        let transformer = UserTransformer::user();
        let doc = Serializer::new(&links, &transformer).item(&rows[0]);
        let data = &doc["data"];
        assert_eq!(data["type"], "user");
        assert_eq!(data["id"], fixture_uuid(1));
        assert_eq!(data["attributes"]["username"], "user1");
        assert_eq!(data["attributes"]["createdAt"], "2024-01-01 01:00:00");
        assert_eq!(data["attributes"]["image"], "");
        assert!(data["attributes"].get("password").is_none());
        assert_eq!(data["links"]["self"], format!("http://localhost/api/v1/user/{}", fixture_uuid(1)));
        assert_eq!(
            data["relationships"]["createdBy"]["links"]["related"],
            format!("http://localhost/api/v1/user/{}/created-by", fixture_uuid(1))
        );
        assert!(data["relationships"]["createdBy"].get("data").is_none());
    }

    #[tokio::test]
    async fn auth_profile_links_without_id() {
        let rows = rows(1).await;
        let links = links();
        let transformer = UserTransformer::auth();
        let doc = Serializer::new(&links, &transformer).item(&rows[0]);
        assert_eq!(doc["data"]["type"], "auth");
        assert_eq!(doc["data"]["links"]["self"], "http://localhost/api/v1/auth");
        assert!(doc["data"].get("relationships").is_none());
    }

    #[tokio::test]
    async fn page_links_stop_at_the_boundaries() {
        let rows = rows(2).await;
        let links = links();
        let transformer = UserTransformer::user();
        let page = Page {
            rows,
            meta: PageMeta::Page { total: 5, count: 2, per_page: 2, current_page: 1, total_pages: 3 },
        };
        let params = QueryParams::parse(Some("sort=-createdAt&page[size]=2"));
        let doc = Serializer::new(&links, &transformer).paginated(&page, &params, &[]);
        assert_eq!(doc["meta"]["pagination"]["totalPages"], 3);
        assert!(doc["links"]["prev"].is_null());
        assert_eq!(
            doc["links"]["next"],
            "http://localhost/api/v1/user?sort=-createdAt&page%5Bsize%5D=2&page%5Bnumber%5D=2"
        );
        assert!(doc.get("included").is_none());
    }

    #[tokio::test]
    async fn included_rows_are_listed_once() {
        let rows = rows(3).await;
        let links = links();
        let transformer = UserTransformer::user();
        let relation = USER_RESOURCE.relation("createdBy").unwrap();
        let included = vec![Included { relation, rows: HashMap::from([("1".to_string(), rows[0].clone())]) }];
        let page = Page {
            rows: rows.clone(),
            meta: PageMeta::Offset { total: 3, count: 3, limit: 10, offset: 0 },
        };
        let doc = Serializer::new(&links, &transformer).paginated(&page, &QueryParams::default(), &included);
        assert_eq!(doc["included"].as_array().unwrap().len(), 1);
        assert_eq!(doc["included"][0]["id"], fixture_uuid(1));
        assert!(doc["data"][0]["relationships"]["createdBy"]["data"].is_null());
        assert_eq!(doc["data"][1]["relationships"]["createdBy"]["data"]["id"], fixture_uuid(1));
        assert_eq!(doc["links"]["self"], "http://localhost/api/v1/user");
    }
}
