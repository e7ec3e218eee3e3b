use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, FilterOrderInfo, FilterTarget, FilterWhereInfo, FilterWhereOptions, Keyset, SortDirection};

/// Alias of the resource table in every generated statement
pub const MAIN_ALIAS: &str = "t0";

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
    relation_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            relation_index: 0,
        }
    }

    pub fn generate(
        conditions: &[FilterWhereInfo],
        keyset: Option<(&[FilterOrderInfo], &Keyset)>,
        soft_delete: bool,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(0);
        filter_where.build(conditions, keyset, soft_delete, options)
    }

    fn build(
        &mut self,
        conditions: &[FilterWhereInfo],
        keyset: Option<(&[FilterOrderInfo], &Keyset)>,
        soft_delete: bool,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut sql_conditions = vec![];
        if soft_delete && !options.include_deleted {
            sql_conditions.push(format!("{} IS NULL", qualified(MAIN_ALIAS, "deleted_at")));
        }
        for condition in conditions {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        if let Some((order, keyset)) = keyset {
            sql_conditions.push(self.build_keyset(order, keyset)?);
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, std::mem::take(&mut self.param_values)))
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        match &condition.target {
            FilterTarget::Column(column) => {
                validate_identifier(column)?;
                Ok(self.comparison(&qualified(MAIN_ALIAS, column), condition))
            }
            FilterTarget::Relation { relation, column } => {
                validate_identifier(column)?;
                validate_identifier(relation.table)?;
                self.relation_index += 1;
                let alias = format!("r{}", self.relation_index);
                let inner = self.comparison(&qualified(&alias, column), condition);
                Ok(format!(
                    "EXISTS (SELECT 1 FROM \"{}\" AS \"{}\" WHERE {} = {} AND {})",
                    relation.table,
                    alias,
                    qualified(&alias, relation.owner_key),
                    qualified(MAIN_ALIAS, relation.foreign_key),
                    inner
                ))
            }
        }
    }

    fn comparison(&mut self, column: &str, condition: &FilterWhereInfo) -> String {
        let cast = condition.kind.sql_cast();
        match condition.operator {
            FilterOp::Like => {
                let p = self.param(Value::String(condition.like_pattern()));
                format!("LOWER({}::text) LIKE {} ESCAPE '\\'", column, p)
            }
            FilterOp::In | FilterOp::Notin => {
                let values = condition.values();
                if values.is_empty() {
                    return if condition.operator == FilterOp::In { "1=0".to_string() } else { "1=1".to_string() };
                }
                let params: Vec<String> = values
                    .into_iter()
                    .map(|v| format!("{}{}", self.param(Value::String(v)), cast))
                    .collect();
                format!("{} {} ({})", column, condition.operator.sql_operator(), params.join(", "))
            }
            op if condition.date_only => {
                let p = self.param(Value::String(condition.value.clone()));
                format!("{}::date {} {}::date", column, op.sql_operator(), p)
            }
            op => {
                let p = self.param(Value::String(condition.value.clone()));
                format!("{} {} {}{}", column, op.sql_operator(), p, cast)
            }
        }
    }

    /// Lexicographic "after anchor" predicate honouring each term's direction.
    /// NULL sorts as the greatest value, matching PostgreSQL defaults.
    fn build_keyset(&mut self, order: &[FilterOrderInfo], keyset: &Keyset) -> Result<String, FilterError> {
        if order.len() != keyset.anchor.len() || order.is_empty() {
            return Err(FilterError::KeysetMismatch(keyset.anchor.len(), order.len()));
        }
        let mut branches = vec![];
        for i in 0..order.len() {
            let mut parts = vec![];
            for j in 0..i {
                parts.push(self.equal(&order[j], &keyset.anchor[j])?);
            }
            parts.push(self.after(&order[i], &keyset.anchor[i])?);
            branches.push(format!("({})", parts.join(" AND ")));
        }
        if keyset.inclusive {
            let mut parts = vec![];
            for (term, value) in order.iter().zip(&keyset.anchor) {
                parts.push(self.equal(term, value)?);
            }
            branches.push(format!("({})", parts.join(" AND ")));
        }
        Ok(format!("({})", branches.join(" OR ")))
    }

    fn equal(&mut self, term: &FilterOrderInfo, value: &Value) -> Result<String, FilterError> {
        validate_identifier(&term.column)?;
        let column = qualified(MAIN_ALIAS, &term.column);
        if value.is_null() {
            return Ok(format!("{} IS NULL", column));
        }
        let p = self.param(value.clone());
        Ok(format!("{} = {}{}", column, p, term.kind.sql_cast()))
    }

    fn after(&mut self, term: &FilterOrderInfo, value: &Value) -> Result<String, FilterError> {
        validate_identifier(&term.column)?;
        let column = qualified(MAIN_ALIAS, &term.column);
        let cast = term.kind.sql_cast();
        Ok(match (term.sort, value.is_null()) {
            (SortDirection::Asc, true) => "1=0".to_string(),
            (SortDirection::Asc, false) => {
                let p = self.param(value.clone());
                format!("({} > {}{} OR {} IS NULL)", column, p, cast, column)
            }
            (SortDirection::Desc, true) => format!("{} IS NOT NULL", column),
            (SortDirection::Desc, false) => {
                let p = self.param(value.clone());
                format!("{} < {}{}", column, p, cast)
            }
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

pub fn qualified(alias: &str, column: &str) -> String {
    format!("\"{}\".\"{}\"", alias, column)
}

pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidColumn(name.to_string()))
    }
}
