//! Exact-match query builder. Grounded in the original Python `QueryBuilder`
//! (`where`/`where_in`/`limit`/`build`) and `execute_exact_match_query`.

use serde_json::Value;

use super::{render_filter, render_tail, validate_field, validate_table, Filter, Op, OrderDir, ParamBinder, QueryError};

pub struct ScalarQueryBuilder {
    table: String,
    select_fields: Vec<String>,
    filters: Vec<Filter>,
    order_by: Option<(String, OrderDir)>,
    limit: Option<u32>,
    skip: Option<u32>,
}

impl ScalarQueryBuilder {
    pub fn new(table: impl Into<String>) -> Result<Self, QueryError> {
        let table = table.into();
        validate_table(&table)?;
        Ok(Self {
            table,
            select_fields: Vec::new(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
            skip: None,
        })
    }

    /// Restricts the projected columns. Unset means `SELECT *`.
    pub fn select(mut self, fields: &[&str]) -> Result<Self, QueryError> {
        for field in fields {
            validate_field(field)?;
            self.select_fields.push((*field).to_string());
        }
        Ok(self)
    }

    pub fn where_clause(mut self, field: &str, value: impl Into<Value>, op: Op) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.filters.push(Filter::Cmp(field.to_string(), op, value.into()));
        Ok(self)
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.where_clause(field, value, Op::Eq)
    }

    /// Raises `TypeMismatch` on an empty list (spec §8: `where_in(f, [])` MUST raise).
    pub fn where_in(mut self, field: &str, values: Vec<Value>) -> Result<Self, QueryError> {
        validate_field(field)?;
        if values.is_empty() {
            return Err(QueryError::TypeMismatch { field: field.to_string(), expected: "non-empty list" });
        }
        self.filters.push(Filter::In(field.to_string(), values));
        Ok(self)
    }

    pub fn where_not_in(mut self, field: &str, values: Vec<Value>) -> Result<Self, QueryError> {
        validate_field(field)?;
        if values.is_empty() {
            return Err(QueryError::TypeMismatch { field: field.to_string(), expected: "non-empty list" });
        }
        self.filters.push(Filter::NotIn(field.to_string(), values));
        Ok(self)
    }

    pub fn where_is_none(mut self, field: &str) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.filters.push(Filter::IsNone(field.to_string()));
        Ok(self)
    }

    pub fn where_is_not_none(mut self, field: &str) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.filters.push(Filter::IsNotNone(field.to_string()));
        Ok(self)
    }

    pub fn order_by(mut self, field: &str, dir: OrderDir) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.order_by = Some((field.to_string(), dir));
        Ok(self)
    }

    /// Raises `BadRange` on a negative limit (spec §4.2: `limit(n≥0)`); `u32`
    /// cannot go negative, so the bound is enforced at the type level and
    /// this stays infallible, matching `skip`.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn build(self) -> (String, std::collections::BTreeMap<String, Value>) {
        let mut binder = ParamBinder::new();
        let where_parts: Vec<String> = self
            .filters
            .into_iter()
            .map(|filter| render_filter(&mut binder, filter))
            .collect();

        let projection = if self.select_fields.is_empty() {
            "*".to_string()
        } else {
            self.select_fields.join(", ")
        };

        let mut sql = format!("SELECT {projection} FROM {}", self.table);
        if !where_parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));
        }
        render_tail(
            &mut sql,
            self.order_by.as_ref().map(|(f, d)| (f.as_str(), *d)),
            self.skip,
            self.limit,
        );

        (sql, binder.into_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_parameterized_select_with_tenant_scope() {
        let (sql, params) = ScalarQueryBuilder::new("entity")
            .unwrap()
            .where_eq("tenant_id", "tenant:acme")
            .unwrap()
            .where_eq("is_deleted", false)
            .unwrap()
            .limit(20)
            .build();

        assert!(sql.starts_with("SELECT * FROM entity WHERE"));
        assert!(sql.contains("tenant_id = $param_0"));
        assert!(sql.contains("is_deleted = $param_1"));
        assert!(sql.ends_with("LIMIT 20"));
        assert_eq!(params.len(), 2);
        assert!(!sql.contains("acme"));
    }

    #[test]
    fn rejects_unknown_table() {
        assert!(ScalarQueryBuilder::new("not_a_real_table").is_err());
    }

    #[test]
    fn where_in_binds_each_value_as_its_own_placeholder() {
        let (sql, params) = ScalarQueryBuilder::new("entity")
            .unwrap()
            .where_in("entity_type", vec!["person".into(), "org".into()])
            .unwrap()
            .build();
        assert!(sql.contains("entity_type IN [$param_0, $param_1]"));
        assert_eq!(params.len(), 2, "where_in([a,b]) must emit two distinct placeholders");
    }

    #[test]
    fn where_in_empty_list_raises() {
        let err = ScalarQueryBuilder::new("entity").unwrap().where_in("entity_type", vec![]);
        assert!(matches!(err, Err(QueryError::TypeMismatch { .. })));
    }

    #[test]
    fn where_not_in_renders_negated_membership() {
        let (sql, params) = ScalarQueryBuilder::new("entity")
            .unwrap()
            .where_not_in("entity_type", vec!["person".into()])
            .unwrap()
            .build();
        assert!(sql.contains("entity_type NOT IN [$param_0]"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn where_is_none_and_is_not_none_need_no_binding() {
        let (sql, params) = ScalarQueryBuilder::new("artifact_chunk")
            .unwrap()
            .where_is_none("embedding")
            .unwrap()
            .build();
        assert!(sql.contains("embedding IS NONE"));
        assert!(params.is_empty());

        let (sql, _) = ScalarQueryBuilder::new("artifact_chunk")
            .unwrap()
            .where_is_not_none("embedding")
            .unwrap()
            .build();
        assert!(sql.contains("embedding IS NOT NONE"));
    }

    #[test]
    fn select_restricts_projected_columns() {
        let (sql, _) = ScalarQueryBuilder::new("entity").unwrap().select(&["name", "entity_type"]).unwrap().build();
        assert!(sql.starts_with("SELECT name, entity_type FROM entity"));
    }

    #[test]
    fn order_by_renders_before_start_and_limit() {
        let (sql, _) = ScalarQueryBuilder::new("entity")
            .unwrap()
            .order_by("name", OrderDir::Desc)
            .unwrap()
            .skip(5)
            .limit(10)
            .build();
        let order_pos = sql.find("ORDER BY name DESC").unwrap();
        let start_pos = sql.find("START 5").unwrap();
        let limit_pos = sql.find("LIMIT 10").unwrap();
        assert!(order_pos < start_pos && start_pos < limit_pos);
    }

    #[test]
    fn comparison_operators_render_correctly() {
        let (sql, _) = ScalarQueryBuilder::new("entity")
            .unwrap()
            .where_clause("created_at", "2024-01-01", Op::Gte)
            .unwrap()
            .build();
        assert!(sql.contains("created_at >= $param_0"));
    }
}
