//! # Contract Clarity
//!
//! Plain-English contract explanations using LLMs.
//!
//! ## Features
//!
//! - **Text Extraction**: Reads `.txt` and `.pdf` uploads page by page
//! - **Structured Analysis**: Returns a typed `AnalysisResult` with clauses, red flags, a verdict and a checklist
//! - **Bounded Retries**: Failed backend attempts are retried with exponential backoff
//! - **Swappable Backends**: Native Gemini structured output, or prompt-embedded schemas via rstructor

pub mod agent;
pub mod analysis;
pub mod config;
pub mod extract;
pub mod gemini;
pub mod generator;
pub mod input;
pub mod prompted;
pub mod report;

pub use agent::{AnalysisError, AnalysisOptions, Analyzer};
pub use analysis::{AnalysisResult, RiskLevel};
pub use config::Config;
pub use extract::{ExtractError, MediaType, TextExtractor};
pub use generator::{BackendError, StructuredGenerator};
