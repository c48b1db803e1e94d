//! Schema generator: walks `crate::registry::TABLES` and emits
//! `DEFINE TABLE`/`DEFINE INDEX` SurrealQL, the way the teacher's
//! `storage::indexes` emits `DEFINE INDEX ... HNSW ...`/`... SEARCH ANALYZER
//! ... BM25 ...` from its hardcoded `hnsw_index_specs`/`fts_index_specs`
//! arrays — generalized here to be driven by the registry instead.
//!
//! Tables stay `SCHEMALESS` (spec §4.1); only indexes are declared.
//! Identifiers with characters outside `[a-zA-Z0-9_]` or a leading digit are
//! backtick-quoted.

use std::collections::BTreeMap;

use crate::error::AppError;
use crate::registry::{FieldDescriptor, TableDescriptor, TABLES};

fn quote_identifier(name: &str) -> String {
    let needs_quoting = name
        .chars()
        .next()
        .is_none_or(|c| c.is_ascii_digit())
        || name.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_'));
    if needs_quoting {
        format!("`{}`", name.replace('`', "``"))
    } else {
        name.to_string()
    }
}

/// One DDL statement, plus a short human label for logging.
#[derive(Debug, Clone)]
pub struct SchemaStatement {
    pub label: String,
    pub sql: String,
}

fn scalar_index_statements(table: &TableDescriptor) -> Vec<SchemaStatement> {
    let mut groups: BTreeMap<&'static str, Vec<&'static FieldDescriptor>> = BTreeMap::new();
    for field in table.fields {
        if field.vector || field.fulltext {
            continue;
        }
        if let Some(index_name) = field.index {
            groups.entry(index_name).or_default().push(field);
        }
    }

    groups
        .into_iter()
        .map(|(index_name, fields)| {
            let field_list = fields
                .iter()
                .map(|f| quote_identifier(f.name))
                .collect::<Vec<_>>()
                .join(", ");
            SchemaStatement {
                label: format!("scalar index {index_name} on {}", table.table_name),
                sql: format!(
                    "DEFINE INDEX IF NOT EXISTS {} ON TABLE {} COLUMNS {};",
                    quote_identifier(index_name),
                    quote_identifier(table.table_name),
                    field_list
                ),
            }
        })
        .collect()
}

fn vector_index_statements(table: &TableDescriptor, embedding_dimension: usize) -> Vec<SchemaStatement> {
    table
        .fields
        .iter()
        .filter(|f| f.vector)
        .filter_map(|f| f.index.map(|index_name| (f, index_name)))
        .map(|(field, index_name)| SchemaStatement {
            label: format!("vector index {index_name} on {}", table.table_name),
            sql: format!(
                "DEFINE INDEX OVERWRITE {} ON TABLE {} FIELDS {} HNSW DIMENSION {} DIST COSINE TYPE F32 EFC 100 M 8 CONCURRENTLY;",
                quote_identifier(index_name),
                quote_identifier(table.table_name),
                quote_identifier(field.name),
                embedding_dimension
            ),
        })
        .collect()
}

fn fulltext_index_statements(table: &TableDescriptor) -> Vec<SchemaStatement> {
    table
        .fields
        .iter()
        .filter(|f| f.fulltext)
        .filter_map(|f| f.index.map(|index_name| (f, index_name)))
        .map(|(field, index_name)| SchemaStatement {
            label: format!("fulltext index {index_name} on {}", table.table_name),
            sql: format!(
                "DEFINE INDEX IF NOT EXISTS {} ON TABLE {} FIELDS {} SEARCH ANALYZER {FTS_ANALYZER_NAME} BM25 CONCURRENTLY;",
                quote_identifier(index_name),
                quote_identifier(table.table_name),
                quote_identifier(field.name)
            ),
        })
        .collect()
}

const FTS_ANALYZER_NAME: &str = "memory_analyzer";
const MAX_APPLY_ATTEMPTS: usize = 3;

/// Generates the `DEFINE TABLE`/`DEFINE INDEX` statements needed to bring a
/// fresh database up to date with the registry. `embedding_dimension` must
/// match the configured embedding model's output width (spec §4.1). The
/// fulltext analyzer is handled separately by `apply` (it needs a live
/// connection to probe snowball support), not generated statically here.
#[must_use]
pub fn generate(embedding_dimension: usize) -> Vec<SchemaStatement> {
    let mut statements = Vec::new();

    for table in TABLES {
        if table.abstract_model {
            continue;
        }
        statements.push(SchemaStatement {
            label: format!("table {}", table.table_name),
            sql: format!(
                "DEFINE TABLE IF NOT EXISTS {} SCHEMALESS;",
                quote_identifier(table.table_name)
            ),
        });
        statements.extend(scalar_index_statements(table));
        statements.extend(vector_index_statements(table, embedding_dimension));
        statements.extend(fulltext_index_statements(table));
    }

    statements
}

/// Runs `generate` against a live connection, logging each statement and
/// surfacing the first failure (mirrors the teacher's `build_indexes`/
/// `ensure_runtime_indexes`, minus the index-build polling loop, which only
/// matters once a table already holds rows). The fulltext analyzer is
/// created first, with the teacher's snowball/ascii-fallback logic, then
/// every `DEFINE TABLE`/`DEFINE INDEX` statement runs with the teacher's
/// retry-on-conflict loop (`create_index_with_polling`'s "read or write
/// conflict" retry, minus its row-count build-progress polling).
pub async fn apply(
    db: &crate::db::SurrealDbClient,
    embedding_dimension: usize,
) -> Result<(), AppError> {
    ensure_fts_analyzer(db).await?;

    for statement in generate(embedding_dimension) {
        tracing::debug!(label = %statement.label, sql = %statement.sql, "applying schema statement");
        apply_with_retry(db, &statement).await?;
    }
    Ok(())
}

/// Defines the fulltext analyzer, preferring snowball stemming and falling
/// back to ascii-only filters when the running SurrealDB build rejects
/// `snowball(english)` (grounded in the teacher's `create_fts_analyzer`).
async fn ensure_fts_analyzer(db: &crate::db::SurrealDbClient) -> Result<(), AppError> {
    let snowball_definition = format!(
        "DEFINE ANALYZER IF NOT EXISTS {FTS_ANALYZER_NAME} TOKENIZERS class \
         FILTERS lowercase, ascii, snowball(english);"
    );

    match db.query(&snowball_definition).await {
        Ok(response) => {
            if response.check().is_ok() {
                return Ok(());
            }
            tracing::warn!("snowball analyzer check failed, attempting ascii fallback definition");
        }
        Err(err) => {
            tracing::warn!(error = %err, "snowball analyzer creation errored, attempting ascii fallback definition");
        }
    }

    let fallback_definition =
        format!("DEFINE ANALYZER IF NOT EXISTS {FTS_ANALYZER_NAME} TOKENIZERS class FILTERS lowercase, ascii;");
    let response = db.query(&fallback_definition).await?;
    response.check()?;
    tracing::warn!("snowball analyzer unavailable, using fallback analyzer with lowercase+ascii only");
    Ok(())
}

/// Submits one schema statement, retrying on a read/write conflict (the
/// teacher's `create_index_with_polling` retry loop) up to
/// `MAX_APPLY_ATTEMPTS` times before giving up.
async fn apply_with_retry(db: &crate::db::SurrealDbClient, statement: &SchemaStatement) -> Result<(), AppError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let outcome = match db.query(&statement.sql).await {
            Ok(response) => response.check().map_err(AppError::from),
            Err(err) => Err(AppError::from(err)),
        };

        match outcome {
            Ok(_) => return Ok(()),
            Err(err) => {
                let conflict = err.to_string().contains("read or write conflict");
                tracing::error!(label = %statement.label, error = %err, attempt = attempts, "schema statement failed");
                if conflict && attempts < MAX_APPLY_ATTEMPTS {
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers_with_special_characters() {
        assert_eq!(quote_identifier("artifact_chunk"), "artifact_chunk");
        assert_eq!(quote_identifier("my-table"), "`my-table`");
        assert_eq!(quote_identifier("1table"), "`1table`");
    }

    #[test]
    fn generate_includes_a_table_statement_per_registered_table() {
        let statements = generate(1536);
        for table in TABLES {
            assert!(statements
                .iter()
                .any(|s| s.sql.contains(&format!("TABLE IF NOT EXISTS {}", table.table_name))));
        }
    }

    #[test]
    fn generate_emits_hnsw_index_for_chunk_embedding() {
        let statements = generate(1536);
        assert!(statements
            .iter()
            .any(|s| s.sql.contains("HNSW DIMENSION 1536") && s.sql.contains("artifact_chunk")));
    }

    #[test]
    fn generate_emits_fulltext_index_for_chunk_text() {
        let statements = generate(1536);
        assert!(statements
            .iter()
            .any(|s| s.sql.contains("SEARCH ANALYZER") && s.sql.contains("artifact_chunk")));
    }
}
