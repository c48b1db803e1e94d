//! Safe, bound-parameter SurrealQL query builders (spec §4.2-4.3). Every
//! value reaches the query as a `$param_N` binding; table and field names are
//! checked against `crate::registry` before being written into the SQL
//! string. Grounded in the original Python `QueryBuilder`/
//! `specialized_builders` (`original_source/app/apps/knowledge/utils/
//! query_builder.py`, `db/query_executor.py`) and the teacher's own
//! bound-parameter discipline in `storage::types::knowledge_relationship`.

pub mod combined;
pub mod fulltext;
pub mod graph;
pub mod scalar;
pub mod vector;

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::registry::allowed_fields;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("unsafe identifier: {0}")]
    UnsafeIdentifier(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("type mismatch for field {field}: expected {expected}")]
    TypeMismatch { field: String, expected: &'static str },
    #[error("invalid range: min {min} > max {max}")]
    BadRange { min: i64, max: i64 },
}

/// Plain-identifier pattern: letters/digits/underscore, not starting with a
/// digit. Matches the original's `validate_field_name` fallback pattern.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates a field name against the registry whitelist, falling back to
/// the plain-identifier pattern for registry fields not explicitly listed
/// (spec §4.2: "every identifier is either in the table's field whitelist or
/// matches `^[a-zA-Z_][a-zA-Z0-9_]*$`").
pub fn validate_field(field: &str) -> Result<(), QueryError> {
    if allowed_fields().contains(field) || is_plain_identifier(field) {
        Ok(())
    } else {
        Err(QueryError::UnsafeIdentifier(field.to_string()))
    }
}

pub fn validate_table(table: &str) -> Result<(), QueryError> {
    if crate::registry::is_known_table(table) {
        Ok(())
    } else {
        Err(QueryError::UnknownTable(table.to_string()))
    }
}

/// Accumulates bound parameters and hands out unique `$param_N` names so
/// builders never string-interpolate a value into SQL.
#[derive(Debug, Default)]
pub struct ParamBinder {
    params: BTreeMap<String, Value>,
    counter: usize,
}

impl ParamBinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` under a caller-chosen stable name (used for the fixed
    /// `tenant_id`/`is_deleted` params every query carries).
    pub fn bind_named(&mut self, name: &str, value: impl Into<Value>) -> String {
        let key = name.to_string();
        self.params.insert(key.clone(), value.into());
        format!("${key}")
    }

    /// Binds `value` under a fresh auto-generated name, returning the
    /// `$param_N` token to splice into the SQL string.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        let name = format!("param_{}", self.counter);
        self.counter += 1;
        self.params.insert(name.clone(), value.into());
        format!("${name}")
    }

    #[must_use]
    pub fn into_params(self) -> BTreeMap<String, Value> {
        self.params
    }

    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

/// Scalar comparison operators (spec §4.2: `{=, !=, >, <, >=, <=, IN, NOT IN}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Op {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Gte => ">=",
            Op::Lte => "<=",
        }
    }
}

/// Sort direction for `order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDir::Asc => "ASC",
            OrderDir::Desc => "DESC",
        }
    }
}

/// A filter condition accumulated by a builder before `build()` renders it.
#[derive(Debug, Clone)]
pub(crate) enum Filter {
    Cmp(String, Op, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    IsNone(String),
    IsNotNone(String),
}

/// Renders one filter into its SQL fragment, binding every value (including
/// every element of an `IN`/`NOT IN` list) as its own placeholder — spec §8:
/// "`where_in(f, [a,b])` MUST emit exactly two distinct placeholders."
pub(crate) fn render_filter(binder: &mut ParamBinder, filter: Filter) -> String {
    match filter {
        Filter::Cmp(field, op, value) => {
            let token = binder.bind(value);
            format!("{field} {} {token}", op.as_sql())
        }
        Filter::In(field, values) => {
            let tokens: Vec<String> = values.into_iter().map(|v| binder.bind(v)).collect();
            format!("{field} IN [{}]", tokens.join(", "))
        }
        Filter::NotIn(field, values) => {
            let tokens: Vec<String> = values.into_iter().map(|v| binder.bind(v)).collect();
            format!("{field} NOT IN [{}]", tokens.join(", "))
        }
        Filter::IsNone(field) => format!("{field} IS NONE"),
        Filter::IsNotNone(field) => format!("{field} IS NOT NONE"),
    }
}

/// Renders an `ORDER BY`/`START`/`LIMIT` tail shared by every builder.
pub(crate) fn render_tail(
    sql: &mut String,
    order_by: Option<(&str, OrderDir)>,
    skip: Option<u32>,
    limit: Option<u32>,
) {
    if let Some((field, dir)) = order_by {
        sql.push_str(&format!(" ORDER BY {field} {}", dir.as_sql()));
    }
    if let Some(skip) = skip {
        sql.push_str(&format!(" START {skip}"));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
}
