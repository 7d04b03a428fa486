//! Generation and scoring backends.
//!
//! The LM is an opaque blocking service. Two capabilities are consumed:
//! free-text generation for a section, and a structured relevance judgment
//! for one file excerpt. Both report failures as [`BackendError`] so retry
//! policy stays a visible loop in [`retry`].
mod command;
pub(crate) mod lm_log;
mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use command::LmCommandBackend;
pub use retry::{call_with_retry, RetryPolicy};

use crate::context::GenerationContext;
use crate::error::BackendError;
use crate::sources::ResolvedSource;
use serde::{Deserialize, Serialize};

/// Structured limits passed alongside a generation prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationConstraints {
    /// Outline depth of the section being generated.
    pub heading_level: usize,
    pub max_words: Option<usize>,
    /// Child headings whose material belongs elsewhere.
    pub avoid_headings: Vec<String>,
}

/// Everything one generation call sees.
pub struct GenerationRequest<'a> {
    pub heading: &'a str,
    /// Augmented prompt (nesting and sibling awareness already applied).
    pub prompt: &'a str,
    pub sources: &'a [ResolvedSource],
    pub context: Option<&'a GenerationContext>,
    pub constraints: Option<&'a GenerationConstraints>,
}

pub trait TextGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, BackendError>;
}

/// One stage-3 scoring call: a truncated excerpt and the section's purpose.
pub struct ScoringRequest<'a> {
    pub path: &'a str,
    pub excerpt: &'a str,
    pub section_purpose: &'a str,
}

/// Structured relevance judgment returned by the scoring backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RelevanceJudgment {
    /// 0 (irrelevant) to 10 (essential).
    pub score: f32,
    pub reasoning: String,
    #[serde(default)]
    pub key_material: String,
}

pub trait RelevanceScorer {
    fn score(&self, request: &ScoringRequest<'_>) -> Result<RelevanceJudgment, BackendError>;
}
