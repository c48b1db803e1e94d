//! LLM-driven entity/relation extraction (spec §4.6.4), used by the
//! retrieval resolver's `RELATED_ARTIFACTS_DATA` level, not by the structured
//! ingest path in `pipeline.rs`. Grounded in the teacher's
//! `IngestionEnricher::perform_analysis` posture: transport/parse failures
//! are logged and swallowed rather than propagated, since this path always
//! degrades to an empty result instead of failing a request.

use common::llm::{ChatMessage, ChatRole, LlmClient};
use common::prompts::PromptStore;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedEntity {
    pub entity_type: String,
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRelation {
    pub from_entity: String,
    pub to_entity: String,
    pub relation_type: String,
    #[serde(default)]
    pub data: Value,
}

fn entity_extraction_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "entity_type": { "type": "string" },
                        "name": { "type": "string" },
                        "data": { "type": "object" }
                    },
                    "required": ["entity_type", "name"]
                }
            }
        },
        "required": ["entities"]
    })
}

fn relation_extraction_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "relations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "from_entity": { "type": "string" },
                        "to_entity": { "type": "string" },
                        "relation_type": { "type": "string" },
                        "data": { "type": "object" }
                    },
                    "required": ["from_entity", "to_entity", "relation_type"]
                }
            }
        },
        "required": ["relations"]
    })
}

fn allowed_types_line(allowed_types: Option<&[String]>) -> Option<String> {
    let types = allowed_types?;
    if types.is_empty() {
        return None;
    }
    Some(format!(
        "\n\nIMPORTANT: only these types are allowed: {}.",
        types.join(", ")
    ))
}

fn render_user_template(template: &str, text: &str) -> String {
    template.replace("{text}", text)
}

/// Accepts an `{"entities": [...]}` / `{"relations": [...]}` envelope, a bare
/// list, or a lone object coerced to a one-element list.
fn coerce_to_list(value: Value, envelope_key: &str) -> Vec<Value> {
    let unwrapped = match value {
        Value::Object(mut map) if map.contains_key(envelope_key) => {
            map.remove(envelope_key).unwrap_or(Value::Null)
        }
        other => other,
    };

    match unwrapped {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

/// Loads the `entity_extraction` prompt, calls the LLM at low temperature,
/// and parses the result. Any failure along the way is logged and yields an
/// empty list — this function never returns an error.
pub async fn extract_entities(
    llm: &dyn LlmClient,
    prompts: &PromptStore,
    model: &str,
    text: &str,
    allowed_types: Option<&[String]>,
) -> Vec<ExtractedEntity> {
    match try_extract_entities(llm, prompts, model, text, allowed_types).await {
        Ok(entities) => entities,
        Err(err) => {
            tracing::warn!(error = %err, "entity extraction failed, returning empty list");
            Vec::new()
        }
    }
}

async fn try_extract_entities(
    llm: &dyn LlmClient,
    prompts: &PromptStore,
    model: &str,
    text: &str,
    allowed_types: Option<&[String]>,
) -> Result<Vec<ExtractedEntity>, common::error::AppError> {
    let mut prompt = prompts.get("entity_extraction").await?;
    if let Some(line) = allowed_types_line(allowed_types) {
        prompt.system.push_str(&line);
    }

    let messages = vec![
        ChatMessage {
            role: ChatRole::System,
            content: prompt.system,
        },
        ChatMessage {
            role: ChatRole::User,
            content: render_user_template(&prompt.user, text),
        },
    ];

    let response = llm
        .chat_json(model, messages, "entity_extraction", entity_extraction_schema())
        .await?;

    let items = coerce_to_list(response, "entities");
    serde_json::from_value(Value::Array(items))
        .map_err(|err| common::error::AppError::LLMParsing(err.to_string()))
}

/// Loads the `relation_extraction` prompt with the already-extracted
/// entities folded into the user template, calls the LLM, and parses the
/// result. Swallows every error into an empty list, same as
/// `extract_entities`.
pub async fn extract_relations(
    llm: &dyn LlmClient,
    prompts: &PromptStore,
    model: &str,
    text: &str,
    entities: &[ExtractedEntity],
    allowed_types: Option<&[String]>,
) -> Vec<ExtractedRelation> {
    match try_extract_relations(llm, prompts, model, text, entities, allowed_types).await {
        Ok(relations) => relations,
        Err(err) => {
            tracing::warn!(error = %err, "relation extraction failed, returning empty list");
            Vec::new()
        }
    }
}

async fn try_extract_relations(
    llm: &dyn LlmClient,
    prompts: &PromptStore,
    model: &str,
    text: &str,
    entities: &[ExtractedEntity],
    allowed_types: Option<&[String]>,
) -> Result<Vec<ExtractedRelation>, common::error::AppError> {
    let mut prompt = prompts.get("relation_extraction").await?;
    if let Some(line) = allowed_types_line(allowed_types) {
        prompt.system.push_str(&line);
    }

    let entities_json = serde_json::to_string(entities)
        .map_err(|err| common::error::AppError::LLMParsing(err.to_string()))?;
    let rendered_user = render_user_template(&prompt.user, text).replace("{entities}", &entities_json);

    let messages = vec![
        ChatMessage {
            role: ChatRole::System,
            content: prompt.system,
        },
        ChatMessage {
            role: ChatRole::User,
            content: rendered_user,
        },
    ];

    let response = llm
        .chat_json(model, messages, "relation_extraction", relation_extraction_schema())
        .await?;

    let items = coerce_to_list(response, "relations");
    serde_json::from_value(Value::Array(items))
        .map_err(|err| common::error::AppError::LLMParsing(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::llm::fake::FakeLlmClient;

    #[tokio::test]
    async fn extracts_entities_from_enveloped_json() {
        let llm = FakeLlmClient::with_chat_response(
            r#"{"entities":[{"entity_type":"person","name":"Ada","data":{}}]}"#,
        );
        let prompts = test_prompt_store();
        let entities = extract_entities(&llm, &prompts, "test-model", "Ada works here", None).await;
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Ada");
    }

    #[tokio::test]
    async fn extracts_entities_from_bare_list() {
        let llm = FakeLlmClient::with_chat_response(
            r#"[{"entity_type":"person","name":"Ada","data":{}}]"#,
        );
        let prompts = test_prompt_store();
        let entities = extract_entities(&llm, &prompts, "test-model", "text", None).await;
        assert_eq!(entities.len(), 1);
    }

    #[tokio::test]
    async fn malformed_json_degrades_to_empty_list() {
        let llm = FakeLlmClient::with_chat_response("not json at all");
        let prompts = test_prompt_store();
        let entities = extract_entities(&llm, &prompts, "test-model", "text", None).await;
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn missing_prompt_degrades_to_empty_list() {
        let llm = FakeLlmClient::with_chat_response("{}");
        let dir = std::env::temp_dir().join(format!("extractor_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let prompts = PromptStore::new(dir.to_str().unwrap());
        let entities = extract_entities(&llm, &prompts, "test-model", "text", None).await;
        assert!(entities.is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    fn test_prompt_store() -> PromptStore {
        let dir = std::env::temp_dir().join(format!("extractor_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("prompts")).unwrap();
        std::fs::write(
            dir.join("prompts/entity_extraction.yaml"),
            "system: extract entities\nuser: \"{text}\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("prompts/relation_extraction.yaml"),
            "system: extract relations\nuser: \"{text} {entities}\"\n",
        )
        .unwrap();
        PromptStore::new(dir.to_str().unwrap())
    }
}
