//! Rule-list validation of request data.
//!
//! Rules are written as pipe-separated lists (`"required|string|between:2,100"`)
//! and every failure of one invocation lands in a single error document.

pub mod auth;
pub mod body;
pub mod user;

use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use tracing::debug;
use validator::ValidateEmail;

use crate::database::store::{ExistsQuery, Store};
use crate::error::ApiError;
use crate::jsonapi::errors::{RequestContext, Rule, ValidationErrors};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRule {
    pub rule: Rule,
    pub params: Vec<String>,
}

/// Parse `"required|between:2,100"`. Unknown rule names are skipped.
pub fn parse_rules(line: &str) -> Vec<ParsedRule> {
    line.split('|')
        .filter(|s| !s.is_empty())
        .filter_map(|part| {
            let (name, params) = match part.split_once(':') {
                Some((name, params)) => (name, params.split(',').map(|p| p.trim().to_string()).collect()),
                None => (part, vec![]),
            };
            match Rule::from_name(name) {
                Some(rule) => Some(ParsedRule { rule, params }),
                None => {
                    debug!("Skipping unknown validation rule: {}", name);
                    None
                }
            }
        })
        .collect()
}

pub struct FieldValidator<'a> {
    context: &'a RequestContext,
    status: StatusCode,
    prefix: &'a str,
    store: Option<&'a dyn Store>,
    ignore: Option<(&'a str, &'a str)>,
}

impl<'a> FieldValidator<'a> {
    pub fn new(context: &'a RequestContext, status: StatusCode) -> Self {
        Self { context, status, prefix: "", store: None, ignore: None }
    }

    /// Prefix attribute names, e.g. `"page."` for `page[size]`
    pub fn prefixed(mut self, prefix: &'a str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_store(mut self, store: &'a dyn Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Exclude the row with `column = value` from `unique` checks
    pub fn ignoring(mut self, column: &'a str, value: &'a str) -> Self {
        self.ignore = Some((column, value));
        self
    }

    pub async fn validate(&self, data: &Map<String, Value>, rules: &[(&str, &str)]) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new(self.context, self.status);
        self.collect(data, rules, &mut errors).await?;
        errors.finish()
    }

    /// Append every failure to `errors`. Store failures abort with `Err`.
    pub async fn collect(
        &self,
        data: &Map<String, Value>,
        rules: &[(&str, &str)],
        errors: &mut ValidationErrors<'_>,
    ) -> Result<(), ApiError> {
        for (field, line) in rules {
            let parsed = parse_rules(line);
            let attribute = format!("{}{}", self.prefix, field);
            let numeric = parsed.iter().any(|r| matches!(r.rule, Rule::Numeric | Rule::Integer));
            let value = data.get(*field).filter(|v| !v.is_null());

            for rule in &parsed {
                let outcome = match value {
                    None => self.check_absent(data, rule),
                    Some(v) if is_empty(v) => self.check_empty(data, rule),
                    Some(v) => self.check(data, v, rule, numeric).await?,
                };
                if let Some(params) = outcome {
                    errors.add_failure(&attribute, rule.rule, &params);
                }
            }
        }
        Ok(())
    }

    fn check_absent(&self, data: &Map<String, Value>, rule: &ParsedRule) -> Option<Vec<(&'static str, String)>> {
        match rule.rule {
            Rule::Required => Some(vec![]),
            Rule::RequiredWith => self.required_with(data, rule),
            _ => None,
        }
    }

    fn check_empty(&self, data: &Map<String, Value>, rule: &ParsedRule) -> Option<Vec<(&'static str, String)>> {
        match rule.rule {
            Rule::Required | Rule::Filled => Some(vec![]),
            Rule::RequiredWith => self.required_with(data, rule),
            _ => None,
        }
    }

    fn required_with(&self, data: &Map<String, Value>, rule: &ParsedRule) -> Option<Vec<(&'static str, String)>> {
        let others_present = rule.params.iter().any(|f| data.get(f).map(|v| !v.is_null() && !is_empty(v)).unwrap_or(false));
        if others_present {
            Some(vec![("values", rule.params.join(" / "))])
        } else {
            None
        }
    }

    async fn check(
        &self,
        data: &Map<String, Value>,
        value: &Value,
        rule: &ParsedRule,
        numeric: bool,
    ) -> Result<Option<Vec<(&'static str, String)>>, ApiError> {
        let text = scalar_text(value);
        let fail = |params: Vec<(&'static str, String)>| Some(params);
        let param = |i: usize| rule.params.get(i).cloned().unwrap_or_default();

        let outcome = match rule.rule {
            Rule::Required | Rule::Filled | Rule::RequiredWith => None,
            Rule::String => (!value.is_string()).then(Vec::new),
            Rule::Array => (!(value.is_object() || value.is_array())).then(Vec::new),
            Rule::Numeric => as_number(value).is_none().then(Vec::new),
            Rule::Integer => as_integer(value).is_none().then(Vec::new),
            Rule::Boolean => (!matches!(text.as_deref(), Some("0" | "1" | "true" | "false"))).then(Vec::new),
            Rule::Uuid => (!text.as_deref().map(is_uuid).unwrap_or(false)).then(Vec::new),
            Rule::Email => (!text.as_deref().map(is_email).unwrap_or(false)).then(Vec::new),
            Rule::Date => (!text.as_deref().map(is_date).unwrap_or(false)).then(Vec::new),
            Rule::DateFormat => {
                let format = param(0);
                let ok = text.as_deref().map(|t| matches_date_format(t, &format)).unwrap_or(false);
                if ok { None } else { fail(vec![("format", format)]) }
            }
            Rule::Min => {
                let min = param(0);
                match (size_of(value, numeric), min.parse::<f64>()) {
                    (Some(size), Ok(limit)) if size < limit => fail(vec![("min", min)]),
                    _ => None,
                }
            }
            Rule::Max => {
                let max = param(0);
                match (size_of(value, numeric), max.parse::<f64>()) {
                    (Some(size), Ok(limit)) if size > limit => fail(vec![("max", max)]),
                    _ => None,
                }
            }
            Rule::Between => {
                let (min, max) = (param(0), param(1));
                match (size_of(value, numeric), min.parse::<f64>(), max.parse::<f64>()) {
                    (Some(size), Ok(lo), Ok(hi)) if size < lo || size > hi => fail(vec![("min", min), ("max", max)]),
                    _ => None,
                }
            }
            Rule::Gt => {
                let bound = param(0);
                match (as_number(value), bound.parse::<f64>()) {
                    (Some(n), Ok(b)) if n > b => None,
                    _ => fail(vec![("value", bound)]),
                }
            }
            Rule::Same => {
                let other = param(0);
                if data.get(&other) == Some(value) { None } else { fail(vec![("other", other)]) }
            }
            Rule::Different => {
                let other = param(0);
                if data.get(&other) == Some(value) { fail(vec![("other", other)]) } else { None }
            }
            Rule::In => {
                let ok = text.as_ref().map(|t| rule.params.iter().any(|p| p == t)).unwrap_or(false);
                if ok { None } else { fail(vec![]) }
            }
            Rule::Unique | Rule::Exists => {
                let (Some(store), Some(text)) = (self.store, text) else {
                    return Ok(None);
                };
                let mut query = ExistsQuery::new(param(0), param(1), text);
                if rule.rule == Rule::Unique {
                    if let Some((column, key)) = self.ignore {
                        query = query.ignoring(column, key);
                    }
                }
                let found = store.exists(&query).await?;
                let failed = if rule.rule == Rule::Unique { found } else { !found };
                failed.then(Vec::new)
            }
            other => {
                debug!("Rule {} has no checker", other.name());
                None
            }
        };
        Ok(outcome)
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// String form of a scalar value
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1".to_string() } else { "0".to_string() }),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            let digits = s.strip_prefix('-').unwrap_or(s);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            s.parse::<i64>().ok()
        }
        _ => None,
    }
}

fn size_of(value: &Value, numeric: bool) -> Option<f64> {
    if numeric {
        if let Some(n) = as_number(value) {
            return Some(n);
        }
    }
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(a) => Some(a.len() as f64),
        Value::Object(o) => Some(o.len() as f64),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

pub fn is_uuid(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok() && value.len() == 36
}

/// RFC 5322 address with a dotted domain; `user@localhost` is rejected
pub fn is_email(value: &str) -> bool {
    let Some((_, domain)) = value.rsplit_once('@') else {
        return false;
    };
    value.validate_email() && domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

pub fn is_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
}

/// Check a value against a PHP-style date format (`Y-m-d`, `Y-m-d H:i:s`)
pub fn matches_date_format(value: &str, format: &str) -> bool {
    let mut chrono_format = String::with_capacity(format.len() * 2);
    let mut has_time = false;
    for ch in format.chars() {
        match ch {
            'Y' => chrono_format.push_str("%Y"),
            'm' => chrono_format.push_str("%m"),
            'd' => chrono_format.push_str("%d"),
            'H' => {
                has_time = true;
                chrono_format.push_str("%H")
            }
            'i' => {
                has_time = true;
                chrono_format.push_str("%M")
            }
            's' => {
                has_time = true;
                chrono_format.push_str("%S")
            }
            other => chrono_format.push(other),
        }
    }
    if has_time {
        NaiveDateTime::parse_from_str(value, &chrono_format).is_ok()
    } else {
        NaiveDate::parse_from_str(value, &chrono_format).is_ok()
    }
}
