//! Bounded-depth graph traversal query builder: one `SELECT` per depth in
//! `[min_depth, max_depth]`, joined with `UNION ALL`, each projecting a
//! literal `distance` column. Grounded in the teacher's
//! `retrieval-pipeline::graph::find_entities_by_relationship_by_id` (native
//! `->relates_to->` traversal) generalized to an arbitrary depth range, and
//! the original Python `GraphQueryBuilder`/`execute_graph_query` (entity id
//! validation: cap at 20 ids, reject any containing SQL keywords).

use serde_json::Value;

use super::{render_filter, validate_field, validate_table, Filter, Op, ParamBinder, QueryError};

const MAX_SEED_ENTITIES: usize = 20;
const SUSPICIOUS_KEYWORDS: &[&str] = &["SELECT", "DROP", "DELETE", "INSERT", "UPDATE", ";"];

fn is_suspicious(id: &str) -> bool {
    let upper = id.to_uppercase();
    SUSPICIOUS_KEYWORDS.iter().any(|kw| upper.contains(kw))
}

pub struct GraphQueryBuilder {
    table: String,
    entity_ids: Vec<String>,
    to_entity_ids: Vec<String>,
    relation_type: Option<String>,
    edge_filters: Vec<Filter>,
    min_depth: u32,
    max_depth: u32,
    order_by_distance: bool,
    limit: u32,
    tenant_id: Option<String>,
}

impl GraphQueryBuilder {
    pub fn new(entity_table: impl Into<String>) -> Result<Self, QueryError> {
        let table = entity_table.into();
        validate_table(&table)?;
        Ok(Self {
            table,
            entity_ids: Vec::new(),
            to_entity_ids: Vec::new(),
            relation_type: None,
            edge_filters: Vec::new(),
            min_depth: 1,
            max_depth: 1,
            order_by_distance: false,
            limit: 20,
            tenant_id: None,
        })
    }

    /// Seeds the traversal. Silently drops invalid/suspicious ids and caps
    /// the list at 20, matching the original's defensive validation ahead of
    /// the query builder (belt-and-braces alongside parameter binding).
    #[must_use]
    pub fn from_entities(mut self, entity_ids: &[String]) -> Self {
        self.entity_ids = entity_ids
            .iter()
            .filter(|id| !is_suspicious(id))
            .take(MAX_SEED_ENTITIES)
            .cloned()
            .collect();
        self
    }

    /// Restricts traversal endpoints to this set (spec §4.3: optional
    /// `to_entities(ids[])`). Same defensive filtering as the seed list.
    #[must_use]
    pub fn to_entities(mut self, entity_ids: &[String]) -> Self {
        self.to_entity_ids = entity_ids
            .iter()
            .filter(|id| !is_suspicious(id))
            .take(MAX_SEED_ENTITIES)
            .cloned()
            .collect();
        self
    }

    /// Adds a scalar filter on an edge field (spec §4.3: "any `where(...)`
    /// on edge fields"), rendered inside the edge-table's `[WHERE …]` step.
    pub fn where_edge(mut self, field: &str, value: impl Into<Value>, op: Op) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.edge_filters.push(Filter::Cmp(field.to_string(), op, value.into()));
        Ok(self)
    }

    /// Validates `1 ≤ min ≤ max ≤ 10` (spec §4.3).
    pub fn depth_range(mut self, min_depth: u32, max_depth: u32) -> Result<Self, QueryError> {
        if min_depth < 1 || min_depth > max_depth || max_depth > 10 {
            return Err(QueryError::BadRange {
                min: i64::from(min_depth),
                max: i64::from(max_depth),
            });
        }
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        Ok(self)
    }

    pub fn relation_type(mut self, relation_type: &str) -> Result<Self, QueryError> {
        validate_field(relation_type)?;
        self.relation_type = Some(relation_type.to_string());
        Ok(self)
    }

    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn order_by_distance(mut self) -> Self {
        self.order_by_distance = true;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Emits `UNION ALL`-joined per-depth `SELECT`s, each graph-stepping
    /// `depth` hops via `->relation->` and projecting a literal `distance`.
    #[must_use]
    pub fn build(self) -> (String, std::collections::BTreeMap<String, Value>) {
        let mut binder = ParamBinder::new();

        if self.entity_ids.is_empty() {
            return (
                format!("SELECT * FROM {} WHERE false", self.table),
                binder.into_params(),
            );
        }

        let ids_token = binder.bind(
            self.entity_ids
                .iter()
                .cloned()
                .map(Value::from)
                .collect::<Vec<_>>(),
        );
        let tenant_token = self
            .tenant_id
            .map(|tenant_id| binder.bind_named("tenant_id", tenant_id));

        // relation_type was already validated as a plain identifier/whitelisted
        // field name, but its *value* must still be bound, not interpolated.
        let mut edge_predicates = Vec::new();
        if let Some(rt) = &self.relation_type {
            let token = binder.bind(rt.clone());
            edge_predicates.push(format!("relation_type = {token}"));
        }
        for filter in self.edge_filters {
            edge_predicates.push(render_filter(&mut binder, filter));
        }
        let relation_segment = if edge_predicates.is_empty() {
            "relation".to_string()
        } else {
            format!("relation[WHERE {}]", edge_predicates.join(" AND "))
        };

        let to_token = if self.to_entity_ids.is_empty() {
            None
        } else {
            Some(binder.bind(
                self.to_entity_ids
                    .iter()
                    .cloned()
                    .map(Value::from)
                    .collect::<Vec<_>>(),
            ))
        };

        let mut selects = Vec::new();
        for depth in self.min_depth..=self.max_depth {
            let hops = (0..depth)
                .map(|_| format!("->{relation_segment}->{}", self.table))
                .collect::<Vec<_>>()
                .join("");
            let mut select = format!(
                "SELECT *, {depth} AS distance FROM (SELECT {hops} AS related FROM {} WHERE id IN {ids_token})",
                self.table
            );
            let mut outer_predicates = Vec::new();
            if let Some(tenant_token) = &tenant_token {
                outer_predicates.push(format!("tenant_id = {tenant_token}"));
            }
            if let Some(to_token) = &to_token {
                outer_predicates.push(format!("id IN {to_token}"));
            }
            if !outer_predicates.is_empty() {
                select.push_str(&format!(" WHERE {}", outer_predicates.join(" AND ")));
            }
            selects.push(select);
        }

        let mut sql = selects.join(" UNION ALL ");
        if self.order_by_distance {
            sql.push_str(" ORDER BY distance ASC");
        }
        sql.push_str(&format!(" LIMIT {}", self.limit));

        (sql, binder.into_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_out_suspicious_entity_ids() {
        let builder = GraphQueryBuilder::new("entity")
            .unwrap()
            .from_entities(&["entity:1".to_string(), "entity:2'; DROP TABLE entity; --".to_string()]);
        assert_eq!(builder.entity_ids, vec!["entity:1".to_string()]);
    }

    #[test]
    fn caps_entity_ids_at_twenty() {
        let ids: Vec<String> = (0..30).map(|i| format!("entity:{i}")).collect();
        let builder = GraphQueryBuilder::new("entity").unwrap().from_entities(&ids);
        assert_eq!(builder.entity_ids.len(), MAX_SEED_ENTITIES);
    }

    #[test]
    fn emits_one_select_per_depth_joined_by_union_all() {
        let (sql, _) = GraphQueryBuilder::new("entity")
            .unwrap()
            .from_entities(&["entity:1".to_string()])
            .depth_range(1, 3)
            .unwrap()
            .build();
        assert_eq!(sql.matches("UNION ALL").count(), 2);
        assert!(sql.contains("1 AS distance"));
        assert!(sql.contains("2 AS distance"));
        assert!(sql.contains("3 AS distance"));
    }

    #[test]
    fn rejects_inverted_depth_range() {
        assert!(GraphQueryBuilder::new("entity").unwrap().depth_range(5, 2).is_err());
    }

    #[test]
    fn rejects_depth_below_one_or_above_ten() {
        assert!(GraphQueryBuilder::new("entity").unwrap().depth_range(0, 1).is_err());
        assert!(GraphQueryBuilder::new("entity").unwrap().depth_range(1, 11).is_err());
    }

    #[test]
    fn single_depth_yields_no_union_all() {
        let (sql, _) = GraphQueryBuilder::new("entity")
            .unwrap()
            .from_entities(&["entity:1".to_string()])
            .depth_range(1, 1)
            .unwrap()
            .build();
        assert!(!sql.contains("UNION ALL"));
    }

    #[test]
    fn empty_seed_list_yields_always_false_query() {
        let (sql, params) = GraphQueryBuilder::new("entity").unwrap().build();
        assert!(sql.contains("WHERE false"));
        assert!(params.is_empty());
    }

    #[test]
    fn to_entities_restricts_endpoints() {
        let (sql, _) = GraphQueryBuilder::new("entity")
            .unwrap()
            .from_entities(&["entity:1".to_string()])
            .to_entities(&["entity:2".to_string()])
            .build();
        assert!(sql.contains("id IN $param_"));
    }

    #[test]
    fn where_edge_and_relation_type_combine_inside_edge_filter() {
        let (sql, params) = GraphQueryBuilder::new("entity")
            .unwrap()
            .from_entities(&["entity:1".to_string()])
            .relation_type("knows")
            .unwrap()
            .where_edge("weight", 1, Op::Gte)
            .unwrap()
            .build();
        assert!(sql.contains("relation[WHERE relation_type ="));
        assert!(sql.contains("AND weight >="));
        assert_eq!(params.len(), 3);
    }
}
