//! `Company` is the tenant root: every other record is scoped to exactly one
//! `Company.company_id`. Unlike the tenant-scoped entities it is not itself
//! `TenantScoped`/`Authorizable` — grounded in the teacher's original Python
//! `Company` model (`original_source/app/apps/memory/models.py`), which also
//! sits outside the `TenantSurrealMixin`/`AuthorizationMixin` hierarchy.
//!
//! Carries the tenant policy (spec §9 design note: "validate against tenant
//! policy" is an explicit function taking a policy snapshot, never a global
//! cache read) — the allowed sensor/entity/relation type lists, where `None`
//! means "all allowed".

use crate::model::Record;
use crate::registry::{FieldDescriptor, FieldType, TableDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DESCRIPTOR: TableDescriptor = TableDescriptor {
    table_name: "company",
    fields: &[
        FieldDescriptor::indexed("company_id", FieldType::String, "idx_company_id"),
        FieldDescriptor::indexed("name", FieldType::String, "idx_company_name"),
        FieldDescriptor::scalar("sensor_types", FieldType::Array(&FieldType::String)),
        FieldDescriptor::scalar(
            "entity_types",
            FieldType::Option(&FieldType::Array(&FieldType::String)),
        ),
        FieldDescriptor::scalar(
            "relation_types",
            FieldType::Option(&FieldType::Array(&FieldType::String)),
        ),
        FieldDescriptor::scalar("data", FieldType::Object),
    ],
    is_edge: false,
    abstract_model: false,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    #[serde(deserialize_with = "crate::types::deserialize_flexible_id")]
    pub id: String,
    /// Externally-facing tenant identifier; unique per spec's
    /// `company_id_already_exists` conflict.
    pub company_id: String,
    pub name: String,
    #[serde(default)]
    pub sensor_types: Vec<String>,
    /// `None` means "all entity types allowed" (spec §3).
    #[serde(default)]
    pub entity_types: Option<Vec<String>>,
    /// `None` means "all relation types allowed" (spec §3).
    #[serde(default)]
    pub relation_types: Option<Vec<String>>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(with = "crate::types::datetime_serde", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::types::datetime_serde", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub meta_data: Option<serde_json::Value>,
}

impl Company {
    #[must_use]
    pub fn allows_sensor(&self, sensor_name: &str) -> bool {
        self.sensor_types.is_empty() || self.sensor_types.iter().any(|s| s == sensor_name)
    }

    #[must_use]
    pub fn allows_entity_type(&self, entity_type: &str) -> bool {
        self.entity_types
            .as_ref()
            .is_none_or(|types| types.iter().any(|t| t == entity_type))
    }

    #[must_use]
    pub fn allows_relation_type(&self, relation_type: &str) -> bool {
        self.relation_types
            .as_ref()
            .is_none_or(|types| types.iter().any(|t| t == relation_type))
    }
}

impl Record for Company {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
    fn meta_data(&self) -> Option<&serde_json::Value> {
        self.meta_data.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(sensor_types: Vec<String>, entity_types: Option<Vec<String>>) -> Company {
        Company {
            id: "company:1".into(),
            company_id: "acme".into(),
            name: "Acme".into(),
            sensor_types,
            entity_types,
            relation_types: None,
            data: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_deleted: false,
            meta_data: None,
        }
    }

    #[test]
    fn empty_sensor_types_allows_anything() {
        let company = fixture(vec![], None);
        assert!(company.allows_sensor("anything"));
    }

    #[test]
    fn non_empty_sensor_types_restricts() {
        let company = fixture(vec!["doc".to_string()], None);
        assert!(company.allows_sensor("doc"));
        assert!(!company.allows_sensor("chat"));
    }

    #[test]
    fn null_entity_types_allows_anything() {
        let company = fixture(vec![], None);
        assert!(company.allows_entity_type("person"));
    }

    #[test]
    fn explicit_entity_types_restricts() {
        let company = fixture(vec![], Some(vec!["person".to_string()]));
        assert!(company.allows_entity_type("person"));
        assert!(!company.allows_entity_type("organization"));
    }

    #[test]
    fn all_relation_types_allowed_by_default() {
        let company = fixture(vec![], None);
        assert!(company.allows_relation_type("knows"));
    }
}
