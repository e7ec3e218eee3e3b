use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::store::Row;
use crate::filter::types::SortDirection;
use crate::jsonapi::serializer::Transformer;
use crate::resource::{camel_case, ColumnDef, ColumnKind, RelationDef, ResourceDescriptor};

const USER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("uuid", ColumnKind::Uuid).filterable(),
    ColumnDef::new("created_at", ColumnKind::Timestamp).sortable().filterable(),
    ColumnDef::new("updated_at", ColumnKind::Timestamp).sortable().filterable(),
    ColumnDef::new("deleted_at", ColumnKind::Timestamp),
    ColumnDef::new("created_by", ColumnKind::Integer),
    ColumnDef::new("updated_by", ColumnKind::Integer),
    ColumnDef::new("deleted_by", ColumnKind::Integer),
    ColumnDef::new("fullname", ColumnKind::Text).sortable().filterable(),
    ColumnDef::new("username", ColumnKind::Text).sortable().filterable(),
    ColumnDef::new("email", ColumnKind::Text).sortable().filterable(),
    ColumnDef::new("phone", ColumnKind::Text).sortable().filterable(),
    ColumnDef::new("password", ColumnKind::Text),
    ColumnDef::new("date_of_birth", ColumnKind::Date).sortable().filterable(),
    ColumnDef::new("address", ColumnKind::Text).filterable(),
    ColumnDef::new("image", ColumnKind::Text),
    ColumnDef::new("image_url", ColumnKind::Text),
    ColumnDef::new("last_login_at", ColumnKind::Timestamp).sortable().filterable(),
    ColumnDef::new("last_login_ip", ColumnKind::Text).filterable(),
];

const USER_RELATIONS: &[RelationDef] = &[
    RelationDef {
        name: "createdBy",
        resource_type: "user",
        table: "user",
        foreign_key: "created_by",
        owner_key: "id",
        name_column: "fullname",
    },
    RelationDef {
        name: "updatedBy",
        resource_type: "user",
        table: "user",
        foreign_key: "updated_by",
        owner_key: "id",
        name_column: "fullname",
    },
];

pub static USER_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource_type: "user",
    url: "user",
    table: "user",
    key_column: "uuid",
    primary_key: "id",
    columns: USER_COLUMNS,
    relations: USER_RELATIONS,
    default_sort: ("created_at", SortDirection::Desc),
    soft_delete: true,
};

/// Attributes rendered for a user, in wire order
pub const USER_ATTRIBUTES: &[&str] = &[
    "created_at",
    "updated_at",
    "fullname",
    "username",
    "email",
    "phone",
    "date_of_birth",
    "address",
    "image",
    "image_url",
    "last_login_at",
    "last_login_ip",
];

/// Columns a client may write through `data.attributes`
pub const USER_WRITABLE: &[&str] = &["fullname", "username", "email", "phone", "date_of_birth", "address"];

/// Column values for the writable attributes present in `attributes`.
/// Scalars are stored as text; the password is left to the caller.
pub fn writable_values(attributes: &Map<String, Value>) -> Row {
    USER_WRITABLE
        .iter()
        .filter_map(|column| {
            let value = attributes.get(&camel_case(column))?;
            let stored = match value {
                Value::Null => Value::Null,
                Value::String(s) => Value::String(s.trim().to_string()),
                other => crate::validation::scalar_text(other).map(Value::String).unwrap_or(Value::Null),
            };
            Some((column.to_string(), stored))
        })
        .collect()
}

/// Typed view of a user row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub fullname: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

impl User {
    pub fn from_row(row: &Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(row.clone()))
    }
}

/// Renders user rows as `user` (collection/item) or `auth` (profile) resources
pub struct UserTransformer {
    resource_type: &'static str,
    url: &'static str,
    keyed_links: bool,
}

impl UserTransformer {
    pub fn user() -> Self {
        Self { resource_type: USER_RESOURCE.resource_type, url: USER_RESOURCE.url, keyed_links: true }
    }

    /// Profile view: type `auth`, self link without the identifier
    pub fn auth() -> Self {
        Self { resource_type: "auth", url: "auth", keyed_links: false }
    }
}

impl Transformer for UserTransformer {
    fn resource_type(&self) -> &str {
        self.resource_type
    }

    fn url(&self) -> &str {
        self.url
    }

    fn id(&self, row: &Row) -> String {
        text(row.get(USER_RESOURCE.key_column))
    }

    fn self_link_has_id(&self) -> bool {
        self.keyed_links
    }

    fn relations(&self) -> &'static [RelationDef] {
        if self.keyed_links {
            USER_RESOURCE.relations
        } else {
            &[]
        }
    }

    fn attributes(&self, row: &Row) -> Map<String, Value> {
        USER_ATTRIBUTES
            .iter()
            .map(|column| {
                let value = match USER_RESOURCE.kind_of(column) {
                    ColumnKind::Timestamp => timestamp_text(row.get(*column)),
                    _ => text(row.get(*column)),
                };
                (camel_case(column), Value::String(value))
            })
            .collect()
    }
}

/// Null renders as an empty string
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// `2024-01-02T03:04:05.123456` → `2024-01-02 03:04:05`
fn timestamp_text(value: Option<&Value>) -> String {
    let raw = text(value);
    parse_timestamp(&raw)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or(raw)
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| chrono::DateTime::parse_from_rfc3339(raw).ok().map(|t| t.naive_utc()))
}
