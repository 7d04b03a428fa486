//! Source discovery for sections that declare no sources.
//!
//! Three stages narrow the repository inventory to a few reasoned files:
//! path heuristics (high recall, no content reads), lexical TF-IDF
//! re-ranking over file content, and backend relevance scoring on the
//! narrowed set only. Every stage's output is no larger than its input.
mod accuracy;
mod pattern;
mod relevance;
mod semantic;
mod terms;
mod topics;

pub use accuracy::{evaluate, load_ground_truth, AccuracyReport, GroundTruth, SectionAccuracy};

use crate::backend::RelevanceScorer;
use crate::config::DiscoveryConfig;
use crate::error::DiscoveryBackendError;
use crate::sources::SourceCache;
use crate::template::{DiscoveryMethod, SectionId, SectionTree, SourceRef};
use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// What discovery knows about the section it is looking for.
#[derive(Debug, Clone)]
pub struct SectionQuery {
    pub heading: String,
    pub heading_path: String,
    pub prompt: String,
}

impl SectionQuery {
    pub fn for_section(tree: &SectionTree, id: SectionId) -> Self {
        let section = tree.get(id);
        Self {
            heading: section.heading.clone(),
            heading_path: tree.heading_path(id),
            prompt: section.prompt.clone(),
        }
    }

    /// Text the lexical stages extract query terms from.
    fn text(&self) -> String {
        format!("{} {}", self.heading_path, self.prompt)
    }

    /// Section purpose handed to the scoring backend.
    fn purpose(&self) -> String {
        if self.prompt.trim().is_empty() {
            format!("Documentation section \"{}\".", self.heading_path)
        } else {
            format!(
                "Documentation section \"{}\": {}",
                self.heading_path,
                self.prompt.trim()
            )
        }
    }
}

/// One ranked file with the reason it is there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Root-relative path with forward slashes.
    pub path: String,
    /// 0 to 10.
    pub score: f32,
    pub reasoning: String,
    pub method: DiscoveryMethod,
}

impl Candidate {
    pub fn to_source_ref(&self) -> SourceRef {
        SourceRef::discovered(&self.path, self.score, &self.reasoning, self.method)
    }
}

/// Sort by score descending, then path, so ties are reproducible.
fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Stage sizes, fallbacks, and the final selection for one section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub heading_path: String,
    pub inventory: usize,
    pub stage1: usize,
    pub stage2: usize,
    pub stage3: usize,
    /// Stage-3 backend calls made.
    pub scored: usize,
    #[serde(serialize_with = "serialize_fallbacks")]
    pub fallbacks: Vec<DiscoveryBackendError>,
    pub selected: Vec<Candidate>,
}

impl DiscoveryReport {
    pub fn source_refs(&self) -> Vec<SourceRef> {
        self.selected.iter().map(Candidate::to_source_ref).collect()
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.selected
            .iter()
            .map(|candidate| PathBuf::from(&candidate.path))
            .collect()
    }
}

#[derive(Serialize)]
struct FallbackNote<'a> {
    path: &'a str,
    error: String,
}

fn serialize_fallbacks<S: Serializer>(
    fallbacks: &[DiscoveryBackendError],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(fallbacks.iter().map(|fallback| FallbackNote {
        path: &fallback.path,
        error: fallback.source.to_string(),
    }))
}

pub struct DiscoveryPipeline<'a> {
    config: &'a DiscoveryConfig,
    scorer: Option<&'a dyn RelevanceScorer>,
}

impl<'a> DiscoveryPipeline<'a> {
    /// `scorer` is `None` when backend scoring is disabled; stage 3 then
    /// selects from stage-2 scores alone.
    pub fn new(config: &'a DiscoveryConfig, scorer: Option<&'a dyn RelevanceScorer>) -> Self {
        Self { config, scorer }
    }

    pub fn discover(
        &self,
        query: &SectionQuery,
        inventory: &[PathBuf],
        cache: &mut SourceCache,
    ) -> DiscoveryReport {
        let stage1 = pattern::match_paths(query, inventory, self.config.stage1_max);
        let stage2 = semantic::narrow(query, &stage1, cache, self.config);
        let ranked = relevance::rank(query, &stage2, cache, self.config, self.scorer);

        debug_assert!(stage2.len() <= stage1.len());
        debug_assert!(ranked.selected.len() <= stage2.len());

        tracing::info!(
            section = %query.heading_path,
            inventory = inventory.len(),
            stage1 = stage1.len(),
            stage2 = stage2.len(),
            stage3 = ranked.selected.len(),
            fallbacks = ranked.fallbacks.len(),
            "discovery complete"
        );

        DiscoveryReport {
            heading_path: query.heading_path.clone(),
            inventory: inventory.len(),
            stage1: stage1.len(),
            stage2: stage2.len(),
            stage3: ranked.selected.len(),
            scored: ranked.scored,
            fallbacks: ranked.fallbacks,
            selected: ranked.selected,
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
