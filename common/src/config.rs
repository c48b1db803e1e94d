//! Environment-driven application configuration. Grounded in the teacher's
//! `utils::config::get_config` (`Config::builder` layering an optional
//! `config` file under `Environment::default()`), generalized to the env
//! vars this service needs.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_project_name() -> String {
    "memory-service".to_string()
}

fn default_debug() -> bool {
    false
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_redis_queue_name() -> String {
    "ingestion".to_string()
}

fn default_storage_path() -> String {
    "./data".to_string()
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_llm_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "openai/text-embedding-3-small".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_debug")]
    pub debug: bool,
    #[serde(default = "default_cors_origins", deserialize_with = "deserialize_cors_origins")]
    pub cors_origins: Vec<String>,

    pub redis_uri: String,
    #[serde(default = "default_redis_queue_name")]
    pub redis_queue_name: String,

    pub surrealdb_uri: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,

    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    pub openrouter_api_key: String,
    #[serde(default = "default_openrouter_base_url")]
    pub openrouter_base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// File path or HTTPS URL; see `crate::prompts`.
    pub prompt_source: String,
}

/// `CORS_ORIGINS` accepts either a comma-separated string or a JSON array,
/// matching spec's "comma or JSON list" wording.
fn deserialize_cors_origins<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(parse_cors_origins(&raw))
}

fn parse_cors_origins(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Vec<String>>(trimmed) {
            return parsed;
        }
    }
    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::default())
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_cors_origins() {
        assert_eq!(
            parse_cors_origins("https://a.com, https://b.com"),
            vec!["https://a.com".to_string(), "https://b.com".to_string()]
        );
    }

    #[test]
    fn parses_json_cors_origins() {
        assert_eq!(
            parse_cors_origins(r#"["https://a.com","https://b.com"]"#),
            vec!["https://a.com".to_string(), "https://b.com".to_string()]
        );
    }
}
