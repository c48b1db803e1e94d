//! Concrete record types: `Company`, `Entity`, `Artifact`, `ArtifactChunk`,
//! `Relation`, `Event`, `IngestJob`. Each implements `Record` (+`TenantScoped`
//! +`Authorizable` where applicable per spec §3) and carries a `DESCRIPTOR`
//! registered in `crate::registry`.
//!
//! The `id`/timestamp plumbing here is adapted from the teacher's
//! `stored_object!` macro (`storage::types::mod::stored_object!`): a flexible
//! id deserializer that accepts either a bare string or a SurrealDB `Thing`,
//! and datetime (de)serialization through `surrealdb::sql::Datetime`.

pub mod artifact;
pub mod artifact_chunk;
pub mod company;
pub mod entity;
pub mod event;
pub mod ingest_job;
pub mod relation;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use surrealdb::sql::Thing;

struct FlexibleIdVisitor;

impl<'de> Visitor<'de> for FlexibleIdVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string or a Thing")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value.to_string())
    }

    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let thing = Thing::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(thing.to_raw())
    }
}

/// Accepts either a bare string or a SurrealDB `Thing` for an `id`-shaped
/// field. `pub` (not `pub(crate)`) because downstream crates project custom
/// row shapes out of hand-built queries (e.g. a query-specific struct that
/// adds a `score` column) and need the same flexible id handling the
/// registered record types get from `tenant_record!`.
pub fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(FlexibleIdVisitor)
}

pub(crate) mod datetime_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Into::<surrealdb::sql::Datetime>::into(*date).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let dt = surrealdb::sql::Datetime::deserialize(deserializer)?;
        Ok(DateTime::<Utc>::from(dt))
    }
}

pub(crate) fn default_public_permission() -> crate::model::Permission {
    crate::model::Permission::Read
}

/// Generates a tenant-scoped, authorizable record struct: the `Record` +
/// `TenantScoped` + `Authorizable` boilerplate plus caller-supplied fields.
macro_rules! tenant_record {
    ($name:ident, { $($(#[$meta:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
        pub struct $name {
            #[serde(deserialize_with = "crate::types::deserialize_flexible_id")]
            pub id: String,
            pub tenant_id: String,
            #[serde(with = "crate::types::datetime_serde", default = "chrono::Utc::now")]
            pub created_at: chrono::DateTime<chrono::Utc>,
            #[serde(with = "crate::types::datetime_serde", default = "chrono::Utc::now")]
            pub updated_at: chrono::DateTime<chrono::Utc>,
            #[serde(default)]
            pub is_deleted: bool,
            #[serde(default)]
            pub meta_data: Option<serde_json::Value>,
            #[serde(default)]
            pub user_permissions: Vec<crate::model::UserPermission>,
            #[serde(default)]
            pub group_permissions: Vec<crate::model::GroupPermission>,
            #[serde(default = "crate::types::default_public_permission")]
            pub public_permission: crate::model::Permission,
            $( $(#[$meta])* pub $field: $ty ),*
        }

        impl crate::model::Record for $name {
            fn id(&self) -> &str {
                &self.id
            }
            fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.created_at
            }
            fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.updated_at
            }
            fn is_deleted(&self) -> bool {
                self.is_deleted
            }
            fn meta_data(&self) -> Option<&serde_json::Value> {
                self.meta_data.as_ref()
            }
        }

        impl crate::model::TenantScoped for $name {
            fn tenant_id(&self) -> &str {
                &self.tenant_id
            }
        }

        impl crate::model::Authorizable for $name {
            fn user_permissions(&self) -> &[crate::model::UserPermission] {
                &self.user_permissions
            }
            fn group_permissions(&self) -> &[crate::model::GroupPermission] {
                &self.group_permissions
            }
            fn public_permission(&self) -> crate::model::Permission {
                self.public_permission
            }
        }
    };
}

pub(crate) use tenant_record;
