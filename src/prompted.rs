//! Prompt-embedded schema backend.
//!
//! Uses rstructor for models that don't take a response schema: the schema
//! travels inside the prompt and the reply is cleaned up before parsing.

use async_trait::async_trait;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use tracing::warn;

use crate::config::{Config, ConfigError};
use crate::generator::{BackendError, GenerationRequest, GenerationResponse, StructuredGenerator};

pub struct PromptedGenerator {
    client: GeminiClient,
}

impl PromptedGenerator {
    pub fn new(api_key: &str, model: GeminiModel) -> Result<Self, BackendError> {
        let client = GeminiClient::new(api_key)
            .map_err(|e| BackendError::Request(e.to_string()))?
            .model(model);
        Ok(Self { client })
    }

    /// Fails for models without a matching rstructor variant
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let model = parse_gemini_model(&config.agent.model).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "agent.model {:?} is not available with output = \"prompt\"; use one of {}",
                config.agent.model,
                PROMPTED_MODELS.join(", ")
            ))
        })?;
        Self::new(config.api_key()?, model).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Build the prompt including instruction, schema, and contract text
fn build_prompt(request: &GenerationRequest) -> String {
    let schema = serde_json::to_string_pretty(&request.response_schema)
        .unwrap_or_else(|_| request.response_schema.to_string());

    format!(
        r#"{}

You MUST respond with valid JSON matching this JSON schema:
{}

Do not include any markdown formatting, code blocks, or explanations. Only output the raw JSON object.

---

{}"#,
        request.system_instruction.trim(),
        schema,
        request.user_text
    )
}

#[async_trait]
impl StructuredGenerator for PromptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        if request.grounding {
            warn!("search grounding is not available with output = \"prompt\"; continuing without it");
        }

        let result = self
            .client
            .generate_with_metadata(&build_prompt(request))
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let cleaned = strip_markdown_json(&result.text);
        Ok(GenerationResponse {
            text: (!cleaned.is_empty()).then_some(cleaned),
            citations: Vec::new(),
        })
    }
}

/// Strip markdown code block wrappers from JSON response
fn strip_markdown_json(text: &str) -> String {
    let trimmed = text.trim();

    // Remove ```json ... ``` or ``` ... ```
    if let Some(rest) = trimmed.strip_prefix("```") {
        let without_prefix = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end_idx) = without_prefix.rfind("```") {
            return without_prefix[..end_idx].trim().to_string();
        }
    }

    trimmed.to_string()
}

/// Models the prompted backend can talk to
pub const PROMPTED_MODELS: [&str; 3] = ["gemini-2.0-flash", "gemini-2.5-flash", "gemini-2.5-pro"];

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> Option<GeminiModel> {
    match model.trim() {
        "gemini-2.0-flash" => Some(GeminiModel::Gemini20Flash),
        "gemini-2.5-flash" => Some(GeminiModel::Gemini25Flash),
        "gemini-2.5-pro" => Some(GeminiModel::Gemini25Pro),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputMode;
    use serde_json::json;

    fn prompted_config(model: &str) -> Config {
        let mut config = Config::default();
        config.agent.output = OutputMode::Prompt;
        config.agent.model = model.to_string();
        config.api.gemini_key = Some("test-key".to_string());
        config
    }

    #[test]
    fn known_models_are_mapped() {
        for model in PROMPTED_MODELS {
            assert!(parse_gemini_model(model).is_some(), "{model} not mapped");
        }
        assert!(parse_gemini_model("gemini-3-pro-preview").is_none());
        assert!(parse_gemini_model("gpt-4o").is_none());
    }

    #[test]
    fn default_model_is_not_swapped_for_another() {
        let config = prompted_config(&Config::default().agent.model);
        match PromptedGenerator::from_config(&config) {
            Err(ConfigError::Invalid(message)) => {
                assert!(message.contains("gemini-3-pro-preview"));
                assert!(message.contains("gemini-2.5-flash"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unsupported model was accepted"),
        }
    }

    #[test]
    fn supported_model_builds_a_generator() {
        assert!(PromptedGenerator::from_config(&prompted_config("gemini-2.5-pro")).is_ok());
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_markdown_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_markdown_json("```\n[]\n```\n"), "[]");
        assert_eq!(strip_markdown_json("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn unterminated_fence_is_left_alone() {
        assert_eq!(strip_markdown_json("```json\n{"), "```json\n{");
    }

    #[test]
    fn prompt_embeds_schema_and_text() {
        let request = GenerationRequest {
            system_instruction: "\n  Be neutral.\n".to_string(),
            user_text: "Analyze this contract:\n\nClause 1".to_string(),
            response_schema: json!({"type": "object", "required": ["overview"]}),
            grounding: false,
        };

        let prompt = build_prompt(&request);
        assert!(prompt.starts_with("Be neutral."));
        assert!(prompt.contains("\"required\": [\n    \"overview\"\n  ]"));
        assert!(prompt.ends_with("Analyze this contract:\n\nClause 1"));
    }
}
