//! Hierarchical generation over the section tree.
//!
//! Nodes are generated one at a time in pre-order: a parent before its
//! children, siblings in declaration order. Each call sees the summaries of
//! what was generated before it, minus its own ancestors, and nothing after.
//! A node failure halts the traversal; whatever finished is kept and returned
//! with the error.
mod assemble;
mod prompt;
mod sanitize;

pub use assemble::{heading_depth, render_markdown, sources_map, SourcesMapEntry};
pub use prompt::{compose_prompt, constraints_for};
pub use sanitize::sanitize;

use crate::backend::{call_with_retry, GenerationRequest, RetryPolicy, TextGenerator};
use crate::config::{ContextConfig, GenerationConfig};
use crate::context::ContextManager;
use crate::error::{BackendError, GenerationError};
use crate::sources::{ResolvedSections, ResolvedSource, SourceCache};
use crate::template::{SectionId, SectionTree};
use crate::util::{rel_path_string, truncate_string};
use serde::Serialize;
use std::path::PathBuf;
use std::rc::Rc;

const TRUNCATION_MARKER: &str = "\n[... truncated ...]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Generating,
    Done,
    Failed,
}

/// Generated output for one node, kept apart from the tree.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSection {
    #[serde(skip)]
    pub id: SectionId,
    pub heading: String,
    pub heading_path: String,
    pub level: usize,
    pub content: String,
    /// Summary recorded into the context after this node.
    pub summary: String,
}

/// Finished nodes in document order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratedDocument {
    pub title: Option<String>,
    pub sections: Vec<GeneratedSection>,
}

#[derive(Debug, Clone)]
pub enum RunStatus {
    Completed,
    Failed(GenerationError),
    /// Stopped by the caller between nodes.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub document: GeneratedDocument,
    /// Indexed by `SectionId`.
    pub states: Vec<NodeState>,
    pub status: RunStatus,
    /// Pre-order index of the last node that reached `Done`.
    pub last_completed: Option<usize>,
    pub context_truncations: usize,
}

impl GenerationOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    pub fn state(&self, id: SectionId) -> NodeState {
        self.states[id.index()]
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub retry: RetryPolicy,
    pub context: ContextConfig,
    pub generation: GenerationConfig,
    /// Print `generate: [n/total] heading` progress lines to stderr.
    pub verbose: bool,
}

pub struct GenerationEngine<'a> {
    tree: &'a SectionTree,
    sources: &'a ResolvedSections,
    generator: &'a dyn TextGenerator,
    settings: EngineSettings,
}

impl<'a> GenerationEngine<'a> {
    pub fn new(
        tree: &'a SectionTree,
        sources: &'a ResolvedSections,
        generator: &'a dyn TextGenerator,
        settings: EngineSettings,
    ) -> Self {
        Self {
            tree,
            sources,
            generator,
            settings,
        }
    }

    /// Generate every node until done, a node fails, or `should_stop`
    /// (given the number of completed nodes) returns true between nodes.
    pub fn run(
        &self,
        cache: &mut SourceCache,
        should_stop: &dyn Fn(usize) -> bool,
    ) -> GenerationOutcome {
        let order = self.tree.preorder();
        let total = order.len();
        let has_title = self.tree.title.is_some();
        let mut states = vec![NodeState::Pending; self.tree.len()];
        let mut context = ContextManager::new(&self.settings.context);
        let mut document = GeneratedDocument {
            title: self.tree.title.clone(),
            sections: Vec::with_capacity(total),
        };
        let mut last_completed = None;
        let mut status = RunStatus::Completed;

        for (position, id) in order.iter().copied().enumerate() {
            if should_stop(position) {
                tracing::info!(completed = position, total, "generation interrupted");
                status = RunStatus::Interrupted;
                break;
            }
            let section = self.tree.get(id);
            let heading_path = self.tree.heading_path(id);
            if self.settings.verbose {
                eprintln!("generate: [{}/{}] {}", position + 1, total, heading_path);
            }
            states[id.index()] = NodeState::Generating;

            let sources = match self.gather_sources(cache, &self.sources.get(id).files) {
                Ok(sources) => sources,
                Err(error) => {
                    states[id.index()] = NodeState::Failed;
                    tracing::warn!(section = %heading_path, error = %error, "section sources unusable");
                    status = RunStatus::Failed(GenerationError {
                        heading: section.heading.clone(),
                        heading_path,
                        attempts: 0,
                        source: error,
                    });
                    break;
                }
            };
            let snapshot = context.snapshot_excluding(&self.ancestors(id));
            let prompt = compose_prompt(self.tree, id);
            let constraints = constraints_for(self.tree, id);
            let request = GenerationRequest {
                heading: &section.heading,
                prompt: &prompt,
                sources: &sources,
                context: Some(&snapshot),
                constraints: Some(&constraints),
            };
            let depth = heading_depth(section.level, has_title);

            let result = call_with_retry(&self.settings.retry, &heading_path, |_| {
                let raw = self.generator.generate(&request)?;
                sanitize(&raw, &section.heading, depth).ok_or_else(|| {
                    BackendError::Transient("generated content is empty".to_string())
                })
            });

            match result {
                Ok(content) => {
                    if let Some(max_words) = section.max_words {
                        let words = content.split_whitespace().count();
                        if words > max_words {
                            tracing::warn!(
                                section = %heading_path,
                                words,
                                max_words,
                                "section exceeds word budget"
                            );
                        }
                    }
                    let summary = context.record(id, &section.heading, &content);
                    states[id.index()] = NodeState::Done;
                    last_completed = Some(position);
                    tracing::info!(
                        section = %heading_path,
                        bytes = content.len(),
                        sources = sources.len(),
                        context_entries = snapshot.len(),
                        "section generated"
                    );
                    document.sections.push(GeneratedSection {
                        id,
                        heading: section.heading.clone(),
                        heading_path,
                        level: section.level,
                        content,
                        summary,
                    });
                }
                Err(failure) => {
                    states[id.index()] = NodeState::Failed;
                    tracing::warn!(
                        section = %heading_path,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "section generation failed"
                    );
                    status = RunStatus::Failed(GenerationError {
                        heading: section.heading.clone(),
                        heading_path,
                        attempts: failure.attempts,
                        source: failure.error,
                    });
                    break;
                }
            }
        }

        GenerationOutcome {
            document,
            states,
            status,
            last_completed,
            context_truncations: context.truncated_entries(),
        }
    }

    fn ancestors(&self, id: SectionId) -> Vec<SectionId> {
        let mut ancestors = Vec::new();
        let mut cursor = self.tree.get(id).parent;
        while let Some(parent) = cursor {
            ancestors.push(parent);
            cursor = self.tree.get(parent).parent;
        }
        ancestors
    }

    /// Read a node's files from the cache within the per-file and total budgets.
    ///
    /// Every declared file must be readable; the first one that is not fails
    /// the node before any backend call.
    fn gather_sources(
        &self,
        cache: &mut SourceCache,
        files: &[PathBuf],
    ) -> Result<Vec<ResolvedSource>, BackendError> {
        let limits = &self.settings.generation;
        let mut remaining = limits.max_source_chars;
        let mut gathered = Vec::new();
        let mut skipped = 0;
        for file in files {
            let Some(content) = cache.get(file) else {
                return Err(BackendError::Permanent(format!(
                    "source {} could not be read (missing, binary, or too large)",
                    rel_path_string(file)
                )));
            };
            if remaining == 0 {
                skipped += 1;
                continue;
            }
            let budget = limits.max_file_chars.min(remaining);
            let content: Rc<str> = if content.len() > budget {
                let mut cut = truncate_string(&content, budget);
                cut.push_str(TRUNCATION_MARKER);
                Rc::from(cut)
            } else {
                content
            };
            remaining = remaining.saturating_sub(content.len());
            gathered.push(ResolvedSource {
                path: rel_path_string(file),
                content,
            });
        }
        if skipped > 0 {
            tracing::info!(skipped, "source budget exhausted");
        }
        if gathered.is_empty() {
            return Err(BackendError::Permanent(
                "the section has no source content within budget".to_string(),
            ));
        }
        Ok(gathered)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
