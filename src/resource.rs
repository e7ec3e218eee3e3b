//! Static per-resource configuration consumed by the validator, the query
//! translator and the serializer.
use crate::filter::types::SortDirection;

/// Storage type of a column. Drives SQL casts and filter value checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Uuid,
    Date,
    Timestamp,
}

impl ColumnKind {
    /// Postgres cast applied to bound text parameters
    pub fn sql_cast(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "::bigint",
            ColumnKind::Text => "",
            ColumnKind::Uuid => "::uuid",
            ColumnKind::Date => "::date",
            ColumnKind::Timestamp => "::timestamp",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub sortable: bool,
    pub filterable: bool,
}

impl ColumnDef {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, sortable: false, filterable: false }
    }

    pub const fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub const fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }
}

/// A to-one relation reachable through a foreign key on the owning table.
///
/// `table` is declared rather than derived from `name`, so irregular plurals
/// never need special casing.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    /// Public (camelCase) relation name used in `include` and `filter`
    pub name: &'static str,
    /// Resource type of the related rows
    pub resource_type: &'static str,
    pub table: &'static str,
    /// Column on the owning table holding the related primary key
    pub foreign_key: &'static str,
    /// Referenced column on the related table
    pub owner_key: &'static str,
    /// Column on the related table that `relation.name` filters address
    pub name_column: &'static str,
}

#[derive(Debug)]
pub struct ResourceDescriptor {
    pub resource_type: &'static str,
    pub url: &'static str,
    pub table: &'static str,
    /// Public identifier column (exposed as JSON:API `id`)
    pub key_column: &'static str,
    /// Internal primary key, used as the sort tiebreaker
    pub primary_key: &'static str,
    pub columns: &'static [ColumnDef],
    pub relations: &'static [RelationDef],
    pub default_sort: (&'static str, SortDirection),
    pub soft_delete: bool,
}

impl ResourceDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn sortable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.sortable)
    }

    pub fn filterable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.filterable)
    }

    pub fn has_sortable(&self) -> bool {
        self.sortable_columns().next().is_some()
    }

    pub fn has_filterable(&self) -> bool {
        self.filterable_columns().next().is_some()
    }

    /// Kind of a column, falling back to text for undeclared columns
    pub fn kind_of(&self, name: &str) -> ColumnKind {
        if name == self.primary_key {
            return ColumnKind::Integer;
        }
        self.column(name).map(|c| c.kind).unwrap_or(ColumnKind::Text)
    }
}

/// camelCase → snake_case (`dateOfBirth` → `date_of_birth`)
pub fn snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    for (i, ch) in input.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '-' || ch == ' ' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// snake_case → camelCase (`created_at` → `createdAt`)
pub fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper = false;
    for ch in input.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            upper = !out.is_empty();
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// camelCase → kebab-case, used for relationship link segments
pub fn kebab_case(input: &str) -> String {
    snake_case(input).replace('_', "-")
}
