//! Loads named `{system, user}` prompt pairs from a file directory or an
//! HTTPS prompt service, with an in-process cache. Grounded in the original
//! `PromptService`/`PrompticClient` (extension-keyed parser table, URL vs.
//! filesystem source detection, cache-then-fetch), rendered in the teacher's
//! `reqwest`-based HTTP-client idiom and `thiserror`/`tracing` conventions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::Deserialize;

use crate::error::AppError;

#[derive(Clone, Debug, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

enum Source {
    Directory(PathBuf),
    HttpBase(String),
}

/// `PROMPT_SOURCE` is a file path (prompts live under `<path>/prompts/`) when
/// it doesn't parse as an `http(s)://` URL, otherwise an API base URL queried
/// as `GET {base}/prompts/{name}`.
fn classify_source(prompt_source: &str) -> Source {
    if prompt_source.starts_with("http://") || prompt_source.starts_with("https://") {
        Source::HttpBase(prompt_source.trim_end_matches('/').to_string())
    } else {
        Source::Directory(PathBuf::from(prompt_source).join("prompts"))
    }
}

pub struct PromptStore {
    source: Source,
    http_client: reqwest::Client,
    cache: RwLock<HashMap<String, Prompt>>,
}

impl PromptStore {
    #[must_use]
    pub fn new(prompt_source: &str) -> Self {
        Self {
            source: classify_source(prompt_source),
            http_client: reqwest::Client::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Prompt, AppError> {
        if let Some(prompt) = self.cache.read().unwrap().get(name) {
            return Ok(prompt.clone());
        }

        let prompt = match &self.source {
            Source::Directory(dir) => load_from_file(dir, name)?,
            Source::HttpBase(base) => load_from_api(&self.http_client, base, name).await?,
        };

        self.cache.write().unwrap().insert(name.to_string(), prompt.clone());
        tracing::debug!(prompt = name, "loaded prompt from external source");
        Ok(prompt)
    }

    pub fn clear_cache(&self) {
        self.cache.write().unwrap().clear();
    }
}

const FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "txt", "md", "prompt"];

fn load_from_file(prompts_dir: &std::path::Path, name: &str) -> Result<Prompt, AppError> {
    for ext in FILE_EXTENSIONS {
        let path = prompts_dir.join(format!("{name}.{ext}"));
        let Ok(raw) = std::fs::read_to_string(&path) else {
            continue;
        };

        let parsed = match *ext {
            "yaml" | "yml" => serde_yaml::from_str::<Prompt>(&raw)
                .map_err(|err| AppError::Validation(format!("{path:?}: {err}"))),
            "json" => serde_json::from_str::<Prompt>(&raw)
                .map_err(|err| AppError::Validation(format!("{path:?}: {err}"))),
            _ => Ok(Prompt {
                system: raw,
                user: "{text}".to_string(),
            }),
        };

        match parsed {
            Ok(prompt) => return Ok(prompt),
            Err(err) => {
                tracing::warn!(?path, error = %err, "failed to parse prompt file, trying next extension");
            }
        }
    }

    Err(AppError::NotFound(format!(
        "prompt '{name}' not found under {prompts_dir:?}"
    )))
}

async fn load_from_api(client: &reqwest::Client, base: &str, name: &str) -> Result<Prompt, AppError> {
    let url = format!("{base}/prompts/{name}");
    let response = client.get(&url).send().await?.error_for_status()?;
    Ok(response.json::<Prompt>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_https_url_as_http_source() {
        assert!(matches!(
            classify_source("https://prompts.example.com"),
            Source::HttpBase(_)
        ));
    }

    #[test]
    fn classifies_plain_path_as_directory_source() {
        assert!(matches!(classify_source("/srv/app"), Source::Directory(_)));
    }

    #[test]
    fn loads_txt_prompt_with_default_user_template() {
        let dir = std::env::temp_dir().join(format!("prompt_store_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("greeting.txt"), "You are a helpful assistant.").unwrap();

        let prompt = load_from_file(&dir, "greeting").unwrap();
        assert_eq!(prompt.system, "You are a helpful assistant.");
        assert_eq!(prompt.user, "{text}");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn loads_yaml_prompt_with_explicit_fields() {
        let dir = std::env::temp_dir().join(format!("prompt_store_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("entity_extraction.yaml"), "system: extract entities\nuser: \"{text}\"\n").unwrap();

        let prompt = load_from_file(&dir, "entity_extraction").unwrap();
        assert_eq!(prompt.system, "extract entities");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_prompt_is_not_found() {
        let dir = std::env::temp_dir().join(format!("prompt_store_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(load_from_file(&dir, "nonexistent").is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
