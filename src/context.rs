//! Forward-only context carried from generated sections to later ones.
//!
//! After each section is generated the manager keeps a short summary (a few
//! key points, not the full text). Later sections see those summaries in
//! traversal order, except those of their own ancestors: a parent only
//! introduces what its children elaborate. When the accumulated summaries
//! exceed the configured budget, the oldest entries are dropped first.
use crate::config::ContextConfig;
use crate::template::SectionId;
use crate::util::truncate_string;
use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub heading: String,
    pub summary: String,
}

impl ContextEntry {
    fn size(&self) -> usize {
        self.heading.len() + self.summary.len()
    }
}

/// Snapshot of the summaries available to the next generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationContext {
    entries: Vec<ContextEntry>,
}

impl GenerationContext {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Markdown list used inside prompts.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("- {}: {}", entry.heading, entry.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
impl GenerationContext {
    pub fn from_entries(entries: Vec<ContextEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn contains(&self, heading: &str) -> bool {
        self.entries.iter().any(|entry| entry.heading == heading)
    }
}

pub struct ContextManager {
    max_points: usize,
    max_summary_chars: usize,
    budget_chars: usize,
    entries: VecDeque<(SectionId, ContextEntry)>,
    truncated: usize,
}

impl ContextManager {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            max_points: config.max_points,
            max_summary_chars: config.max_summary_chars,
            budget_chars: config.budget_chars,
            entries: VecDeque::new(),
            truncated: 0,
        }
    }

    /// Summarize a generated section and append it. Returns the summary.
    pub fn record(&mut self, id: SectionId, heading: &str, generated_text: &str) -> String {
        let summary = summarize(generated_text, self.max_points, self.max_summary_chars);
        self.entries.push_back((
            id,
            ContextEntry {
                heading: heading.to_string(),
                summary: summary.clone(),
            },
        ));
        self.enforce_budget();
        summary
    }

    /// Accumulated context minus the entries recorded for `excluded` sections.
    pub fn snapshot_excluding(&self, excluded: &[SectionId]) -> GenerationContext {
        GenerationContext {
            entries: self
                .entries
                .iter()
                .filter(|(id, _)| !excluded.contains(id))
                .map(|(_, entry)| entry.clone())
                .collect(),
        }
    }

    /// Entries dropped so far to stay within the budget.
    pub fn truncated_entries(&self) -> usize {
        self.truncated
    }

    fn total_size(&self) -> usize {
        self.entries.iter().map(|(_, entry)| entry.size()).sum()
    }

    fn enforce_budget(&mut self) {
        while self.entries.len() > 1 && self.total_size() > self.budget_chars {
            if let Some((_, dropped)) = self.entries.pop_front() {
                self.truncated += 1;
                tracing::warn!(
                    heading = %dropped.heading,
                    budget_chars = self.budget_chars,
                    dropped_total = self.truncated,
                    "context budget exceeded; dropped oldest summary"
                );
            }
        }
    }
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").expect("regex for list items"))
}

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?](?:\s+|$)").expect("regex for sentence ends"))
}

/// First `max_points` list items or sentences, skipping headings and code.
fn summarize(text: &str, max_points: usize, max_chars: usize) -> String {
    let mut points: Vec<String> = Vec::new();
    let mut paragraph = String::new();
    let mut in_fence = false;

    for line in text.lines() {
        if points.len() >= max_points {
            break;
        }
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.starts_with('#') || trimmed.starts_with('|') {
            continue;
        }
        if trimmed.is_empty() {
            push_sentences(&mut points, &paragraph, max_points);
            paragraph.clear();
            continue;
        }
        if let Some(found) = list_item_re().find(line) {
            push_sentences(&mut points, &paragraph, max_points);
            paragraph.clear();
            if points.len() < max_points {
                points.push(line[found.end()..].trim().to_string());
            }
            continue;
        }
        if !paragraph.is_empty() {
            paragraph.push(' ');
        }
        paragraph.push_str(trimmed);
    }
    push_sentences(&mut points, &paragraph, max_points);

    let summary = points.join(" ");
    if summary.len() <= max_chars {
        return summary;
    }
    let mut bounded = truncate_string(&summary, max_chars.saturating_sub(3));
    bounded.push_str("...");
    bounded
}

fn push_sentences(points: &mut Vec<String>, paragraph: &str, max_points: usize) {
    let mut start = 0;
    for found in sentence_end_re().find_iter(paragraph) {
        if points.len() >= max_points {
            return;
        }
        let sentence = paragraph[start..found.end()].trim();
        if !sentence.is_empty() {
            points.push(sentence.to_string());
        }
        start = found.end();
    }
    let rest = paragraph[start..].trim();
    if !rest.is_empty() && points.len() < max_points {
        points.push(rest.to_string());
    }
}

#[cfg(test)]
impl ContextManager {
    pub fn snapshot(&self) -> GenerationContext {
        self.snapshot_excluding(&[])
    }
}
