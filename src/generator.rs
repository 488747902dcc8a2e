//! Structured generation backends.
//!
//! A [`StructuredGenerator`] takes an instruction, the user's text and a JSON
//! schema, and returns the raw text the model produced plus any citations.
//! Parsing and retries live in [`crate::agent`].

use async_trait::async_trait;
use thiserror::Error;

/// A single failed attempt against the backend. All variants are retryable.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Empty response from AI")]
    EmptyResponse,
    #[error("Analysis failed to return structured data.")]
    NoContent,
    #[error("request blocked by the model: {0}")]
    Blocked(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Request(String),
}

/// Everything one generation attempt sends
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub user_text: String,
    pub response_schema: serde_json::Value,
    /// Let the backend ground its answer with web search
    pub grounding: bool,
}

/// A grounding citation as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Citation {
    pub uri: Option<String>,
    pub title: Option<String>,
}

/// Raw output of one generation attempt
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    /// Model output, expected to be JSON matching the request schema
    pub text: Option<String>,
    pub citations: Vec<Citation>,
}

#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResponse, BackendError>;
}

#[async_trait]
impl<G: StructuredGenerator + ?Sized> StructuredGenerator for Box<G> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        (**self).generate(request).await
    }
}
