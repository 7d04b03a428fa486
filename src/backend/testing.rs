//! In-process fakes for the backend traits.
use super::{
    GenerationRequest, RelevanceJudgment, RelevanceScorer, ScoringRequest, TextGenerator,
};
use crate::context::GenerationContext;
use crate::error::BackendError;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// What one generation call was given.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub heading: String,
    pub prompt: String,
    pub context: Option<GenerationContext>,
    pub source_paths: Vec<String>,
    pub avoid_headings: Vec<String>,
}

/// Generator that records every call and answers `Content for <heading>.`
#[derive(Default)]
pub struct RecordingGenerator {
    calls: RefCell<Vec<RecordedCall>>,
    fail_on: Option<(String, BackendError)>,
    transient_failures: Cell<u32>,
    responses: BTreeMap<String, String>,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call for `heading` with `error`.
    pub fn failing_on(mut self, heading: &str, error: BackendError) -> Self {
        self.fail_on = Some((heading.to_string(), error));
        self
    }

    /// Fail the first `count` calls (any heading) transiently.
    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.set(count);
        self
    }

    /// Answer `heading` with a fixed response instead of the default text.
    pub fn responding(mut self, heading: &str, response: &str) -> Self {
        self.responses
            .insert(heading.to_string(), response.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn headings(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|call| call.heading.clone())
            .collect()
    }

    pub fn call_for(&self, heading: &str) -> Option<RecordedCall> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find(|call| call.heading == heading)
            .cloned()
    }
}

impl TextGenerator for RecordingGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, BackendError> {
        self.calls.borrow_mut().push(RecordedCall {
            heading: request.heading.to_string(),
            prompt: request.prompt.to_string(),
            context: request.context.cloned(),
            source_paths: request
                .sources
                .iter()
                .map(|source| source.path.clone())
                .collect(),
            avoid_headings: request
                .constraints
                .map(|constraints| constraints.avoid_headings.clone())
                .unwrap_or_default(),
        });
        let remaining = self.transient_failures.get();
        if remaining > 0 {
            self.transient_failures.set(remaining - 1);
            return Err(BackendError::Transient("simulated timeout".to_string()));
        }
        if let Some((heading, error)) = &self.fail_on {
            if heading == request.heading {
                return Err(error.clone());
            }
        }
        Ok(self
            .responses
            .get(request.heading)
            .cloned()
            .unwrap_or_else(|| format!("Content for {}.", request.heading)))
    }
}

/// Scorer answering from a path-to-score table; unknown paths fail.
#[derive(Default)]
pub struct ScriptedScorer {
    scores: BTreeMap<String, f32>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedScorer {
    pub fn new(scores: &[(&str, f32)]) -> Self {
        Self {
            scores: scores
                .iter()
                .map(|(path, score)| (path.to_string(), *score))
                .collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl RelevanceScorer for ScriptedScorer {
    fn score(&self, request: &ScoringRequest<'_>) -> Result<RelevanceJudgment, BackendError> {
        self.calls.borrow_mut().push(request.path.to_string());
        match self.scores.get(request.path) {
            Some(score) => Ok(RelevanceJudgment {
                score: *score,
                reasoning: format!("{} scored {score}", request.path),
                key_material: String::new(),
            }),
            None => Err(BackendError::Transient(format!(
                "no scripted score for {}",
                request.path
            ))),
        }
    }
}
