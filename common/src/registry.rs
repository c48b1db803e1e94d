//! Explicit model registry: a fixed, hand-written list of table descriptors
//! rather than any runtime reflection/inventory magic (per REDESIGN FLAGS —
//! no MRO walk, no `inventory`/`linkme`). The query builder whitelists table
//! and field names against this registry before any identifier reaches a
//! SurrealQL string.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Declared type of a field, used by the schema generator for documentation
/// and by callers that want to validate values before binding them. Tables
/// stay `SCHEMALESS` in SurrealDB; this is a Rust-side contract only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    String,
    Datetime,
    Array(&'static FieldType),
    Record(&'static str),
    Object,
    Option(&'static FieldType),
}

/// One field on a registered table.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
    /// Name of the (possibly shared) scalar index this field belongs to, if any.
    pub index: Option<&'static str>,
    pub vector: bool,
    pub fulltext: bool,
}

impl FieldDescriptor {
    #[must_use]
    pub const fn scalar(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            index: None,
            vector: false,
            fulltext: false,
        }
    }

    #[must_use]
    pub const fn indexed(name: &'static str, ty: FieldType, index: &'static str) -> Self {
        Self {
            name,
            ty,
            index: Some(index),
            vector: false,
            fulltext: false,
        }
    }

    #[must_use]
    pub const fn vector(name: &'static str, index: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Array(&FieldType::Float),
            index: Some(index),
            vector: true,
            fulltext: false,
        }
    }

    #[must_use]
    pub const fn fulltext(name: &'static str, index: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::String,
            index: Some(index),
            vector: false,
            fulltext: true,
        }
    }
}

/// Descriptor for one registered table, including whether it's an edge
/// (graph relation) table.
#[derive(Debug, Clone, Copy)]
pub struct TableDescriptor {
    pub table_name: &'static str,
    pub fields: &'static [FieldDescriptor],
    pub is_edge: bool,
    /// Models with no concrete table of their own (none currently; kept for
    /// future mixin-only descriptors) are skipped by the schema generator.
    pub abstract_model: bool,
}

macro_rules! register {
    ($($table:expr),* $(,)?) => {
        pub const TABLES: &[TableDescriptor] = &[$($table),*];
    };
}

register!(
    crate::types::company::DESCRIPTOR,
    crate::types::entity::DESCRIPTOR,
    crate::types::artifact::DESCRIPTOR,
    crate::types::artifact_chunk::DESCRIPTOR,
    crate::types::relation::DESCRIPTOR,
    crate::types::event::DESCRIPTOR,
    crate::types::ingest_job::DESCRIPTOR,
);

fn compute_allowed_fields() -> HashSet<&'static str> {
    let mut set: HashSet<&'static str> = HashSet::new();
    set.insert("tenant_id");
    set.insert("is_deleted");
    set.insert("id");
    set.insert("created_at");
    set.insert("updated_at");
    for table in TABLES {
        for field in table.fields {
            set.insert(field.name);
        }
    }
    set
}

static ALLOWED_FIELDS: OnceLock<HashSet<&'static str>> = OnceLock::new();

/// The whitelist of field names safe to interpolate as an identifier into a
/// query. Computed once from the registered tables (spec §4.2 safety
/// invariant: every field name used in a query must be in this set, or match
/// the plain-identifier pattern, whichever the caller's builder requires).
pub fn allowed_fields() -> &'static HashSet<&'static str> {
    ALLOWED_FIELDS.get_or_init(compute_allowed_fields)
}

#[must_use]
pub fn table(table_name: &str) -> Option<&'static TableDescriptor> {
    TABLES.iter().find(|t| t.table_name == table_name)
}

#[must_use]
pub fn is_known_table(table_name: &str) -> bool {
    TABLES.iter().any(|t| t.table_name == table_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_fields_includes_core_record_fields() {
        let fields = allowed_fields();
        assert!(fields.contains("tenant_id"));
        assert!(fields.contains("is_deleted"));
        assert!(fields.contains("id"));
    }

    #[test]
    fn allowed_fields_includes_registered_table_fields() {
        let fields = allowed_fields();
        assert!(fields.contains("name"));
        assert!(fields.contains("embedding"));
    }

    #[test]
    fn every_registered_table_is_findable_by_name() {
        for t in TABLES {
            assert!(is_known_table(t.table_name));
        }
    }
}
