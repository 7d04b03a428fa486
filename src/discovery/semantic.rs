//! Stage 2: TF-IDF re-ranking over stage-1 file content.
//!
//! The corpus is the stage-1 candidate set. A document scores the sum of
//! `tf * idf` over the query terms it contains, with `tf = 1 + ln(count)` and
//! `idf = ln((N + 1) / (df + 1)) + 1`, plus a weighted share of its stage-1
//! path score. Scores are normalised so the best candidate gets 10.
use super::pattern::query_terms;
use super::terms::term_counts;
use super::{sort_candidates, Candidate, SectionQuery};
use crate::config::DiscoveryConfig;
use crate::sources::SourceCache;
use crate::template::DiscoveryMethod;
use std::collections::HashMap;
use std::path::Path;

const MAX_REASON_TERMS: usize = 4;

pub(super) fn narrow(
    query: &SectionQuery,
    stage1: &[Candidate],
    cache: &mut SourceCache,
    config: &DiscoveryConfig,
) -> Vec<Candidate> {
    if stage1.is_empty() {
        return Vec::new();
    }
    let terms = query_terms(query);

    // Unreadable files leave the pipeline here: never scored, never selected.
    let mut readable: Vec<&Candidate> = Vec::with_capacity(stage1.len());
    let mut documents: Vec<HashMap<String, usize>> = Vec::with_capacity(stage1.len());
    for candidate in stage1 {
        let Some(content) = cache.get(Path::new(&candidate.path)) else {
            tracing::debug!(path = %candidate.path, "unreadable candidate dropped");
            continue;
        };
        documents.push(term_counts(&format!("{} {}", candidate.path, content)));
        readable.push(candidate);
    }

    let corpus_size = documents.len() as f64;
    let idf: HashMap<&str, f64> = terms
        .iter()
        .map(|term| {
            let df = documents
                .iter()
                .filter(|counts| counts.contains_key(term))
                .count() as f64;
            (term.as_str(), ((corpus_size + 1.0) / (df + 1.0)).ln() + 1.0)
        })
        .collect();

    let mut raw_scores = Vec::with_capacity(readable.len());
    for (candidate, counts) in readable.iter().zip(&documents) {
        let mut contributions: Vec<(&str, f64)> = terms
            .iter()
            .filter_map(|term| {
                let count = *counts.get(term)?;
                let tf = 1.0 + (count as f64).ln();
                Some((term.as_str(), tf * idf.get(term.as_str()).copied().unwrap_or(1.0)))
            })
            .collect();
        let lexical: f64 = contributions.iter().map(|(_, value)| value).sum();
        let path_bonus = config.topic_path_weight * f64::from(candidate.score);
        contributions.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let matched: Vec<&str> = contributions
            .iter()
            .take(MAX_REASON_TERMS)
            .map(|(term, _)| *term)
            .collect();
        raw_scores.push((lexical + path_bonus, lexical, matched));
    }

    let best = raw_scores
        .iter()
        .map(|(total, _, _)| *total)
        .fold(0.0_f64, f64::max);

    let mut candidates: Vec<Candidate> = readable
        .iter()
        .zip(raw_scores)
        .map(|(candidate, (total, lexical, matched))| {
            let score = if best > 0.0 {
                (total / best * 10.0) as f32
            } else {
                0.0
            };
            let reasoning = if matched.is_empty() {
                format!("no query terms in content; {}", candidate.reasoning)
            } else {
                format!(
                    "content matches {} (tf-idf {lexical:.2}); {}",
                    matched.join(", "),
                    candidate.reasoning
                )
            };
            Candidate {
                path: candidate.path.clone(),
                score,
                reasoning,
                method: DiscoveryMethod::Semantic,
            }
        })
        .collect();
    sort_candidates(&mut candidates);
    candidates.truncate(config.stage2_top_k);
    candidates
}
