//! Stage 3: backend relevance scoring on the narrowed set.
//!
//! Only the first `stage3_max` stage-2 candidates are scored, each from an
//! excerpt capped at `excerpt_chars`. A failed call keeps the candidate at
//! its stage-2 score. Candidates scoring above the threshold survive and the
//! best `max_sources` are returned.
use super::{sort_candidates, Candidate, SectionQuery};
use crate::backend::{RelevanceScorer, ScoringRequest};
use crate::config::DiscoveryConfig;
use crate::error::DiscoveryBackendError;
use crate::sources::SourceCache;
use crate::template::DiscoveryMethod;
use crate::util::truncate_string;
use std::path::Path;

pub(super) struct Ranked {
    pub selected: Vec<Candidate>,
    pub scored: usize,
    pub fallbacks: Vec<DiscoveryBackendError>,
}

pub(super) fn rank(
    query: &SectionQuery,
    stage2: &[Candidate],
    cache: &mut SourceCache,
    config: &DiscoveryConfig,
    scorer: Option<&dyn RelevanceScorer>,
) -> Ranked {
    let mut scored = 0;
    let mut fallbacks = Vec::new();
    let mut judged: Vec<Candidate> = match scorer {
        Some(scorer) if config.stage3_max > 0 => {
            let purpose = query.purpose();
            let mut judged = Vec::new();
            for candidate in stage2.iter().take(config.stage3_max) {
                let content = cache.get(Path::new(&candidate.path));
                let excerpt = truncate_string(
                    content.as_deref().unwrap_or_default(),
                    config.excerpt_chars,
                );
                scored += 1;
                let request = ScoringRequest {
                    path: &candidate.path,
                    excerpt: &excerpt,
                    section_purpose: &purpose,
                };
                match scorer.score(&request) {
                    Ok(judgment) => {
                        tracing::debug!(
                            path = %candidate.path,
                            score = judgment.score,
                            key_material = %judgment.key_material,
                            "relevance judged"
                        );
                        let reasoning = judgment.reasoning.trim();
                        judged.push(Candidate {
                            path: candidate.path.clone(),
                            score: judgment.score.clamp(0.0, 10.0),
                            reasoning: if reasoning.is_empty() {
                                format!("relevance score {:.1}", judgment.score)
                            } else {
                                reasoning.to_string()
                            },
                            method: DiscoveryMethod::Llm,
                        });
                    }
                    Err(source) => {
                        let fallback = DiscoveryBackendError {
                            path: candidate.path.clone(),
                            source,
                        };
                        tracing::warn!(
                            section = %query.heading_path,
                            error = %fallback,
                            stage2_score = candidate.score,
                            "relevance scoring failed; using stage-2 score"
                        );
                        fallbacks.push(fallback);
                        judged.push(candidate.clone());
                    }
                }
            }
            judged
        }
        _ => stage2.to_vec(),
    };

    judged.retain(|candidate| candidate.score > config.score_threshold);
    sort_candidates(&mut judged);
    judged.truncate(config.max_sources);
    Ranked {
        selected: judged,
        scored,
        fallbacks,
    }
}
