use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::{ColumnKind, RelationDef};

/// Comparison operators accepted in `filter[column][op]=value`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Not,
    Gt,
    Gteq,
    Lt,
    Lteq,
    In,
    Notin,
    Like,
}

impl FilterOp {
    pub const ALL: [FilterOp; 9] = [
        FilterOp::Eq,
        FilterOp::Not,
        FilterOp::Gt,
        FilterOp::Gteq,
        FilterOp::Lt,
        FilterOp::Lteq,
        FilterOp::In,
        FilterOp::Notin,
        FilterOp::Like,
    ];

    pub fn parse(op: &str) -> Option<FilterOp> {
        Self::ALL.iter().copied().find(|o| o.as_str() == op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Not => "not",
            FilterOp::Gt => "gt",
            FilterOp::Gteq => "gteq",
            FilterOp::Lt => "lt",
            FilterOp::Lteq => "lteq",
            FilterOp::In => "in",
            FilterOp::Notin => "notin",
            FilterOp::Like => "like",
        }
    }

    /// SQL comparison for the scalar operators
    pub fn sql_operator(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Not => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gteq => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lteq => "<=",
            FilterOp::In => "IN",
            FilterOp::Notin => "NOT IN",
            FilterOp::Like => "LIKE",
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, FilterOp::In | FilterOp::Notin)
    }
}

/// Column addressed by a filter: on the resource table or through a relation
#[derive(Debug, Clone)]
pub enum FilterTarget {
    Column(String),
    Relation { relation: &'static RelationDef, column: String },
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub target: FilterTarget,
    pub operator: FilterOp,
    /// Raw value from the query string. Split on commas for `in`/`notin`.
    pub value: String,
    pub kind: ColumnKind,
    /// Compare at date granularity (value is `YYYY-MM-DD` on a date/time column)
    pub date_only: bool,
}

impl FilterWhereInfo {
    pub fn new(target: FilterTarget, operator: FilterOp, value: impl Into<String>, kind: ColumnKind) -> Self {
        let value = value.into();
        let date_only = matches!(kind, ColumnKind::Date | ColumnKind::Timestamp)
            && !operator.is_set()
            && operator != FilterOp::Like
            && is_iso_date(&value);
        Self { target, operator, value, kind, date_only }
    }

    /// Values for set membership; the single trimmed value otherwise
    pub fn values(&self) -> Vec<String> {
        if self.operator.is_set() {
            self.value
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        } else {
            vec![self.value.clone()]
        }
    }

    /// `like` pattern: lower-cased, trimmed and wrapped in wildcards
    /// Substring pattern; `%`, `_` and `\` in the value match literally
    pub fn like_pattern(&self) -> String {
        let mut escaped = String::new();
        for c in self.value.trim().to_lowercase().chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        format!("%{}%", escaped)
    }
}

#[derive(Debug, Clone)]
pub struct FilterWhereOptions {
    pub include_deleted: bool,
}

impl Default for FilterWhereOptions {
    fn default() -> Self {
        Self { include_deleted: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn reversed(&self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
    pub kind: ColumnKind,
}

impl FilterOrderInfo {
    pub fn new(column: impl Into<String>, sort: SortDirection, kind: ColumnKind) -> Self {
        Self { column: column.into(), sort, kind }
    }

    pub fn reversed(&self) -> Self {
        Self { column: self.column.clone(), sort: self.sort.reversed(), kind: self.kind }
    }
}

/// Keyset predicate: rows positioned after `anchor` in the filter's sort
/// order, optionally including the anchor itself. `anchor` holds one value
/// per order term.
#[derive(Debug, Clone)]
pub struct Keyset {
    pub anchor: Vec<Value>,
    pub inclusive: bool,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// `YYYY-MM-DD` with nothing else
pub fn is_iso_date(value: &str) -> bool {
    value.len() == 10 && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_nine_operators() {
        for op in FilterOp::ALL {
            assert_eq!(FilterOp::parse(op.as_str()), Some(op));
        }
        assert_eq!(FilterOp::parse("neq"), None);
        assert_eq!(FilterOp::parse("EQ"), None);
    }

    #[test]
    fn splits_set_values() {
        let info = FilterWhereInfo::new(
            FilterTarget::Column("phone".into()),
            FilterOp::In,
            "1, 2,,3",
            ColumnKind::Text,
        );
        assert_eq!(info.values(), vec!["1", "2", "3"]);
    }

    #[test]
    fn date_granularity_only_for_date_columns() {
        let ts = FilterWhereInfo::new(FilterTarget::Column("created_at".into()), FilterOp::Eq, "2024-01-02", ColumnKind::Timestamp);
        assert!(ts.date_only);
        let text = FilterWhereInfo::new(FilterTarget::Column("address".into()), FilterOp::Eq, "2024-01-02", ColumnKind::Text);
        assert!(!text.date_only);
        let full = FilterWhereInfo::new(FilterTarget::Column("created_at".into()), FilterOp::Gt, "2024-01-02T10:00:00Z", ColumnKind::Timestamp);
        assert!(!full.date_only);
    }

    #[test]
    fn like_pattern_is_lowercased() {
        let info = FilterWhereInfo::new(FilterTarget::Column("fullname".into()), FilterOp::Like, " JoHn ", ColumnKind::Text);
        assert_eq!(info.like_pattern(), "%john%");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        let info = FilterWhereInfo::new(FilterTarget::Column("email".into()), FilterOp::Like, "a_b%c\\d", ColumnKind::Text);
        assert_eq!(info.like_pattern(), "%a\\_b\\%c\\\\d%");
    }
}
