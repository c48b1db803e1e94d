//! Generic CRUD repository plus an edge-specialized repository for
//! `Relation`. Grounded in the teacher's `SurrealDbClient::{store_item,
//! get_item, delete_item, get_all_stored_items}` generalized into a typed
//! `Repository<T>`, and `KnowledgeRelationship::store_relationship`'s
//! `RELATE ... SET ...` pattern for edges.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::db::SurrealDbClient;
use crate::error::AppError;
use crate::types::relation::Relation;

/// Serializes a timestamp through the same `datetime_serde` encoding the
/// record types use, so a freshly-bumped `updated_at` compares equal to one
/// read back off an existing record.
fn datetime_to_value(dt: chrono::DateTime<chrono::Utc>) -> Value {
    #[derive(serde::Serialize)]
    struct Wrap {
        #[serde(with = "crate::types::datetime_serde")]
        v: chrono::DateTime<chrono::Utc>,
    }
    serde_json::to_value(Wrap { v: dt })
        .ok()
        .and_then(|wrapped| wrapped.get("v").cloned())
        .unwrap_or(Value::Null)
}

pub struct Repository<'a, T> {
    db: &'a SurrealDbClient,
    table: &'static str,
    _marker: PhantomData<T>,
}

impl<'a, T> Repository<'a, T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(db: &'a SurrealDbClient, table: &'static str) -> Self {
        Self {
            db,
            table,
            _marker: PhantomData,
        }
    }

    pub async fn save(&self, item: &T) -> Result<T, AppError> {
        self.db.store(self.table, item).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<T>, AppError> {
        self.db.get(self.table, id).await
    }

    /// Applies a partial update and returns the *old* values of the fields
    /// that actually changed, plus the new `updated_at` (spec §4.5/§8:
    /// `update(**fields) → changed_subset`). `updated_at` is bumped to now
    /// unless the caller already supplied one.
    pub async fn update(
        &self,
        id: &str,
        mut patch: BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, AppError> {
        let before: T = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{}:{id}", self.table)))?;
        let before_value = serde_json::to_value(&before)
            .map_err(|err| AppError::InternalError(format!("failed to serialize {}: {err}", self.table)))?;
        let before_fields = before_value.as_object().cloned().unwrap_or_default();

        patch
            .entry("updated_at".to_string())
            .or_insert_with(|| datetime_to_value(chrono::Utc::now()));

        let mut changed = BTreeMap::new();
        for (field, new_value) in &patch {
            if field == "updated_at" {
                continue;
            }
            let old_value = before_fields.get(field).cloned().unwrap_or(Value::Null);
            if &old_value != new_value {
                changed.insert(field.clone(), old_value);
            }
        }

        let mut query = self.db.query("UPDATE type::thing($table, $id) MERGE $patch");
        query = query
            .bind(("table", self.table.to_string()))
            .bind(("id", id.to_string()))
            .bind(("patch", Value::Object(patch.clone().into_iter().collect())));
        query.await?;

        changed.insert(
            "updated_at".to_string(),
            patch.remove("updated_at").unwrap_or(Value::Null),
        );
        Ok(changed)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut query = self
            .db
            .query("UPDATE type::thing($table, $id) SET is_deleted = true");
        query = query
            .bind(("table", self.table.to_string()))
            .bind(("id", id.to_string()));
        query.await?;
        Ok(())
    }

    pub async fn find_many(&self, tenant_id: &str, limit: u32) -> Result<Vec<T>, AppError> {
        let (sql, params) = crate::query::scalar::ScalarQueryBuilder::new(self.table)
            .map_err(|err| AppError::Validation(err.to_string()))?
            .where_eq("tenant_id", tenant_id)
            .map_err(|err| AppError::Validation(err.to_string()))?
            .where_eq("is_deleted", false)
            .map_err(|err| AppError::Validation(err.to_string()))?
            .limit(limit)
            .build();

        crate::executor::QueryExecutor::new(self.db).execute(&sql, params).await
    }
}

/// Persists and reads `Relation` edges, translating between the spec-facing
/// `source_id`/`target_id` and the `out`/`in` fields SurrealDB's `RELATE`
/// produces (spec §9 design note). This struct is the only place that
/// translation happens.
pub struct EdgeRepository<'a> {
    db: &'a SurrealDbClient,
}

impl<'a> EdgeRepository<'a> {
    #[must_use]
    pub fn new(db: &'a SurrealDbClient) -> Self {
        Self { db }
    }

    /// `RELATE source -> relation -> target SET ...` inside a transaction,
    /// then re-reads the created edge (mirrors
    /// `KnowledgeRelationship::store_relationship`'s
    /// `BEGIN TRANSACTION ... RELATE ... COMMIT TRANSACTION` shape).
    pub async fn relate(
        &self,
        tenant_id: &str,
        source_id: &str,
        target_id: &str,
        relation_type: &str,
        data: Value,
    ) -> Result<Relation, AppError> {
        let sql = "BEGIN TRANSACTION;
            LET $src = type::thing('entity', $source_id);
            LET $tgt = type::thing('entity', $target_id);
            RELATE $src -> relation -> $tgt SET
                tenant_id = $tenant_id,
                relation_type = $relation_type,
                data = $data,
                is_deleted = false,
                created_at = time::now(),
                updated_at = time::now();
            COMMIT TRANSACTION;";

        let mut query = self.db.query(sql);
        query = query
            .bind(("source_id", source_id.to_string()))
            .bind(("target_id", target_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("relation_type", relation_type.to_string()))
            .bind(("data", data));
        let mut response = query.await?;

        let raw: Vec<RawEdge> = response.take(response.num_statements() - 1)?;
        let edge = raw
            .into_iter()
            .next()
            .ok_or_else(|| AppError::InternalError("RELATE produced no edge".to_string()))?;
        Ok(edge.into_relation())
    }

    pub async fn delete_by_source(&self, source_id: &str) -> Result<(), AppError> {
        let mut query = self.db.query("UPDATE relation SET is_deleted = true WHERE in = type::thing('entity', $source_id)");
        query = query.bind(("source_id", source_id.to_string()));
        query.await?;
        Ok(())
    }

    /// `find_one(source_id=s, target_id=t, relation_type=rt)` (spec §4.5,
    /// §8 relation round-trip law), translating the caller-facing
    /// `source_id`/`target_id` names to the store's `in`/`out` via
    /// `record::id()` rather than comparing the raw fields directly, since
    /// `relation` rows carry no `source_id`/`target_id` columns of their own.
    pub async fn find_one(
        &self,
        tenant_id: &str,
        source_id: &str,
        target_id: &str,
        relation_type: &str,
    ) -> Result<Option<Relation>, AppError> {
        let sql = "SELECT * FROM relation \
                   WHERE record::id(in) = $source_id \
                     AND record::id(out) = $target_id \
                     AND relation_type = $relation_type \
                     AND tenant_id = $tenant_id \
                     AND is_deleted = false \
                   LIMIT 1";
        let mut query = self.db.query(sql);
        query = query
            .bind(("source_id", source_id.to_string()))
            .bind(("target_id", target_id.to_string()))
            .bind(("relation_type", relation_type.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        let mut response = query.await?;
        let rows: Vec<RawEdge> = response.take(0)?;
        Ok(rows.into_iter().next().map(RawEdge::into_relation))
    }

    /// All non-deleted edges whose `in` *and* `out` both fall inside
    /// `entity_ids` (spec §4.7 level 4: "mutual relations" among a selected
    /// set). Same `record::id()` translation as `find_one`.
    pub async fn find_mutual(&self, tenant_id: &str, entity_ids: &[String]) -> Result<Vec<Relation>, AppError> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = entity_ids.iter().map(|id| strip_table_prefix(id).to_string()).collect();
        let sql = "SELECT * FROM relation \
                   WHERE tenant_id = $tenant_id \
                     AND is_deleted = false \
                     AND record::id(in) IN $ids \
                     AND record::id(out) IN $ids";
        let mut query = self.db.query(sql);
        query = query.bind(("tenant_id", tenant_id.to_string())).bind(("ids", ids));
        let mut response = query.await?;
        let rows: Vec<RawEdge> = response.take(0)?;
        Ok(rows.into_iter().map(RawEdge::into_relation).collect())
    }
}

/// Strips a `table:id` prefix if present; `record::id()`-style comparisons
/// in `EdgeRepository` expect the bare id half.
fn strip_table_prefix(id: &str) -> &str {
    id.rsplit_once(':').map_or(id, |(_, rest)| rest)
}

/// Shape of a row as SurrealDB's `RELATE` actually returns it: endpoints
/// under `out`/`in`, never `source_id`/`target_id`.
#[derive(serde::Deserialize)]
struct RawEdge {
    #[serde(deserialize_with = "crate::types::deserialize_flexible_id")]
    id: String,
    #[serde(deserialize_with = "crate::types::deserialize_flexible_id")]
    out: String,
    #[serde(rename = "in", deserialize_with = "crate::types::deserialize_flexible_id")]
    in_: String,
    tenant_id: String,
    relation_type: String,
    #[serde(default)]
    data: Value,
    #[serde(with = "crate::types::datetime_serde", default = "chrono::Utc::now")]
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(with = "crate::types::datetime_serde", default = "chrono::Utc::now")]
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl RawEdge {
    fn into_relation(self) -> Relation {
        Relation {
            id: self.id,
            tenant_id: self.tenant_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_deleted: false,
            meta_data: None,
            user_permissions: vec![],
            group_permissions: vec![],
            public_permission: crate::model::Permission::Read,
            // `RELATE $src -> relation -> $tgt` stores `in = $src`, `out =
            // $tgt` (SurrealDB's native `from->out` convention), so the
            // source is `in` and the target is `out`.
            source_id: self.in_,
            target_id: self.out,
            relation_type: self.relation_type,
            data: self.data,
        }
    }
}
