//! Google Gemini backend with native structured output.
//!
//! Talks to the `generateContent` REST endpoint directly so the response
//! schema and the search-grounding tool can both be set on the request.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, ConfigError};
use crate::generator::{
    BackendError, Citation, GenerationRequest, GenerationResponse, StructuredGenerator,
};

/// User-Agent string identifying this client
const USER_AGENT: &str = concat!("clarity/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_json_schema: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct GeminiTool {
    google_search: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

/// Gemini backend using `responseJsonSchema` for constrained output.
pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from configuration; the API key is read here, once
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.api_key()?;
        Self::new(
            config.agent.endpoint.as_str(),
            config.agent.model.as_str(),
            api_key,
            config.request_timeout(),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

fn build_request(request: &GenerationRequest) -> GeminiRequest<'_> {
    let tools = if request.grounding {
        vec![GeminiTool {
            google_search: serde_json::Map::new(),
        }]
    } else {
        Vec::new()
    };

    GeminiRequest {
        system_instruction: GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: &request.system_instruction,
            }],
        },
        contents: vec![GeminiContent {
            role: Some("user"),
            parts: vec![GeminiPart {
                text: &request.user_text,
            }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_json_schema: &request.response_schema,
        },
        tools,
    }
}

fn parse_response(body: &str) -> Result<GenerationResponse, BackendError> {
    let response: GeminiResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(BackendError::Blocked(reason));
        }
        return Ok(GenerationResponse::default());
    };

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    let citations = candidate
        .grounding_metadata
        .map(|m| m.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .map(|chunk| match chunk.web {
            Some(web) => Citation {
                uri: web.uri,
                title: web.title,
            },
            None => Citation::default(),
        })
        .collect();

    Ok(GenerationResponse {
        text: (!text.is_empty()).then_some(text),
        citations,
    })
}

fn api_error(status: u16, body: &str) -> BackendError {
    let message = serde_json::from_str::<GeminiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    BackendError::Api { status, message }
}

#[async_trait]
impl StructuredGenerator for GeminiGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        debug!(model = %self.model, grounding = request.grounding, "gemini generateContent");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(grounding: bool) -> GenerationRequest {
        GenerationRequest {
            system_instruction: "Explain contracts.".to_string(),
            user_text: "Analyze this contract:\n\nThe tenant shall...".to_string(),
            response_schema: json!({"type": "object"}),
            grounding,
        }
    }

    #[test]
    fn request_body_carries_schema_and_instruction() {
        let req = request(false);
        let body = serde_json::to_value(build_request(&req)).unwrap();

        assert_eq!(
            body,
            json!({
                "systemInstruction": {"parts": [{"text": "Explain contracts."}]},
                "contents": [{
                    "role": "user",
                    "parts": [{"text": "Analyze this contract:\n\nThe tenant shall..."}]
                }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseJsonSchema": {"type": "object"}
                }
            })
        );
    }

    #[test]
    fn grounding_adds_search_tool() {
        let req = request(true);
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(body["tools"], json!([{"google_search": {}}]));
    }

    #[test]
    fn response_text_parts_are_concatenated() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}
            }]
        })
        .to_string();

        let response = parse_response(&body).unwrap();
        assert_eq!(response.text.as_deref(), Some("{\"a\":1}"));
        assert!(response.citations.is_empty());
    }

    #[test]
    fn grounding_chunks_become_citations_in_order() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{}"}]},
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://a.example", "title": "A"}},
                        {"retrievedContext": {}},
                        {"web": {"title": "no uri"}}
                    ]
                }
            }]
        })
        .to_string();

        let response = parse_response(&body).unwrap();
        assert_eq!(
            response.citations,
            [
                Citation {
                    uri: Some("https://a.example".into()),
                    title: Some("A".into())
                },
                Citation::default(),
                Citation {
                    uri: None,
                    title: Some("no uri".into())
                },
            ]
        );
    }

    #[test]
    fn no_candidates_is_an_empty_response() {
        let response = parse_response("{}").unwrap();
        assert!(response.text.is_none());
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string();
        assert!(matches!(
            parse_response(&body),
            Err(BackendError::Blocked(reason)) if reason == "SAFETY"
        ));
    }

    #[test]
    fn api_error_uses_message_from_body() {
        let body = json!({"error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}})
            .to_string();
        let err = api_error(429, &body);
        assert_eq!(err.to_string(), "API error (429): Resource exhausted");

        let err = api_error(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "API error (502): Bad Gateway");
    }

    #[test]
    fn endpoint_trailing_slash_is_ignored() {
        let generator = GeminiGenerator::new(
            "https://example.test/v1beta/",
            "gemini-2.5-flash",
            "key",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            generator.url(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
