//! Contract analysis agent.
//!
//! Sends the contract to a [`StructuredGenerator`] with a fixed instruction
//! and schema, validates the reply into an [`AnalysisResult`], and retries
//! failed attempts with exponential backoff.

pub use crate::analysis::AnalysisResult;

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::Source;
use crate::config::{Config, OutputMode};
use crate::gemini::GeminiGenerator;
use crate::generator::{BackendError, Citation, GenerationRequest, StructuredGenerator};
use crate::prompted::PromptedGenerator;

/// Message used when every attempt failed without an error to report
pub const FALLBACK_FAILURE: &str = "We encountered an issue analyzing your document. It might be too large or contain complex formatting.";

/// Longest pause between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub const SYSTEM_INSTRUCTION: &str = r#"
You are ContractClarity AI, an expert legal document explainer designed to help non-lawyers understand contracts safely and clearly.
You are NOT a lawyer and do not give legal advice. Your role is to simplify and highlight risks.

CRITICAL INSTRUCTIONS:
- Break the contract into logical clauses.
- Explain each in plain English (12-year-old level).
- Detect "Red Flags" like hidden penalties, one-sided obligations, and unfair termination.
- ALWAYS remain neutral, calm, and non-alarmist.
- If a contract is heavily biased towards the issuer, state it clearly but professionally.

RESPONSE FORMAT:
You must return a structured JSON response matching the provided schema.
Ensure the "plainVerdict" is a reassuring but honest summary for the user.
"#;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Please paste contract text or upload a file first.")]
    EmptyInput,
    #[error("{0}")]
    Failed(String),
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Retry and grounding settings for an [`Analyzer`]
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub grounding: bool,
}

impl AnalysisOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            grounding: config.agent.grounding,
        }
    }
}

/// Delay after the given failed attempt (0-based): `base * 2^attempt`, capped
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Runs contract analyses against one backend.
pub struct Analyzer<G> {
    generator: G,
    options: AnalysisOptions,
}

impl Analyzer<Box<dyn StructuredGenerator>> {
    /// Build the backend selected by `agent.output`
    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        let generator: Box<dyn StructuredGenerator> = match config.agent.output {
            OutputMode::Schema => Box::new(GeminiGenerator::from_config(config)?),
            OutputMode::Prompt => Box::new(PromptedGenerator::from_config(config)?),
        };
        Ok(Self::new(generator, AnalysisOptions::from_config(config)))
    }
}

impl<G: StructuredGenerator> Analyzer<G> {
    pub fn new(generator: G, options: AnalysisOptions) -> Self {
        Self { generator, options }
    }

    pub fn with_grounding(mut self, grounding: bool) -> Self {
        self.options.grounding = grounding;
        self
    }

    /// Analyze a contract.
    ///
    /// Blank text is rejected before any request goes out. Attempts run one
    /// after another; when all of them fail the last error's message is
    /// returned as [`AnalysisError::Failed`].
    pub async fn analyze(
        &self,
        text: &str,
        on_status: Option<&(dyn Fn(&str) + Send + Sync)>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let request = GenerationRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_text: format!("Analyze this contract:\n\n{content}"),
            response_schema: AnalysisResult::response_schema(),
            grounding: self.options.grounding,
        };

        let max_attempts = self.options.max_attempts.max(1);
        let mut last_error: Option<BackendError> = None;

        for attempt in 0..max_attempts {
            if let Some(status) = on_status {
                status(&self.status_message(attempt + 1));
            }
            debug!(attempt = attempt + 1, max_attempts, "sending analysis request");

            match self.attempt(&request).await {
                Ok(result) => {
                    info!(
                        attempt = attempt + 1,
                        clauses = result.clauses.len(),
                        "analysis complete"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);

                    if attempt + 1 < max_attempts {
                        let delay = backoff_delay(attempt, self.options.base_delay);
                        debug!(?delay, "backing off before retry");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_FAILURE.to_string());
        Err(AnalysisError::Failed(message))
    }

    fn status_message(&self, attempt: u32) -> String {
        if self.options.grounding {
            format!("Analyzing clauses with web research (Attempt {attempt})...")
        } else {
            format!("Analyzing clauses (Attempt {attempt})...")
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<AnalysisResult, BackendError> {
        let response = self.generator.generate(request).await?;

        let text = response
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(BackendError::EmptyResponse)?;

        let mut result: AnalysisResult =
            serde_json::from_str(text).map_err(|e| BackendError::Malformed(e.to_string()))?;

        if result.is_empty() {
            return Err(BackendError::NoContent);
        }

        // Sources come from grounding metadata only, never from the model text
        result.sources = request
            .grounding
            .then(|| citations_to_sources(response.citations));

        Ok(result)
    }
}

/// Keep citations with a usable URI, in backend order
fn citations_to_sources(citations: Vec<Citation>) -> Vec<Source> {
    citations
        .into_iter()
        .filter_map(|c| {
            let uri = c.uri?.trim().to_string();
            if uri.is_empty() {
                return None;
            }
            let title = c
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| uri.clone());
            Some(Source { uri, title })
        })
        .collect()
}
