//! Strict in-memory section tree.
//!
//! Sections live in an arena and refer to children by index, so traversal and
//! failure bookkeeping work on plain `SectionId`s instead of nested borrows.
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a source reference came to be attached to a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    Declared,
    Pattern,
    Semantic,
    Llm,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::Declared => "declared",
            DiscoveryMethod::Pattern => "pattern",
            DiscoveryMethod::Semantic => "semantic",
            DiscoveryMethod::Llm => "llm",
        }
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared pattern or a discovered file attached to a section.
///
/// Declared references never carry `score` or `reasoning`; discovered ones
/// always carry both. Constructors enforce this.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pattern: String,
    reasoning: Option<String>,
    score: Option<f32>,
    method: DiscoveryMethod,
}

impl SourceRef {
    pub fn declared(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reasoning: None,
            score: None,
            method: DiscoveryMethod::Declared,
        }
    }

    /// A discovered file; `method` must not be `Declared`.
    pub fn discovered(
        path: impl Into<String>,
        score: f32,
        reasoning: impl Into<String>,
        method: DiscoveryMethod,
    ) -> Self {
        debug_assert!(method != DiscoveryMethod::Declared);
        Self {
            pattern: path.into(),
            reasoning: Some(reasoning.into()),
            score: Some(score.clamp(0.0, 10.0)),
            method,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn score(&self) -> Option<f32> {
        self.score
    }

    pub fn method(&self) -> DiscoveryMethod {
        self.method
    }

    pub fn is_declared(&self) -> bool {
        self.method == DiscoveryMethod::Declared
    }
}

/// Index of a section inside its [`SectionTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub(crate) usize);

impl SectionId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    pub heading: String,
    /// Depth in the outline, starting at 1 for top-level sections.
    pub level: usize,
    pub prompt: String,
    pub sources: Vec<SourceRef>,
    pub max_words: Option<usize>,
    pub parent: Option<SectionId>,
    pub children: Vec<SectionId>,
}

impl Section {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Sections without declared patterns are eligible for discovery.
    pub fn wants_discovery(&self) -> bool {
        self.sources.is_empty()
    }
}

/// The whole outline plus document-level metadata.
#[derive(Debug, Clone, Default)]
pub struct SectionTree {
    pub title: Option<String>,
    pub output: Option<String>,
    pub(crate) nodes: Vec<Section>,
    pub(crate) roots: Vec<SectionId>,
}

impl SectionTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[SectionId] {
        &self.roots
    }

    pub fn get(&self, id: SectionId) -> &Section {
        &self.nodes[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = SectionId> {
        (0..self.nodes.len()).map(SectionId)
    }

    /// Depth-first pre-order: parent before children, siblings in order.
    pub fn preorder(&self) -> Vec<SectionId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<SectionId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    /// Sections sharing this section's parent (or the roots), excluding itself.
    pub fn siblings(&self, id: SectionId) -> Vec<SectionId> {
        let peers = match self.nodes[id.0].parent {
            Some(parent) => &self.nodes[parent.0].children,
            None => &self.roots,
        };
        peers.iter().copied().filter(|peer| *peer != id).collect()
    }

    /// `Parent > Child` path used in messages and map keys.
    pub fn heading_path(&self, id: SectionId) -> String {
        let mut parts = vec![self.nodes[id.0].heading.as_str()];
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            parts.push(self.nodes[parent.0].heading.as_str());
            cursor = self.nodes[parent.0].parent;
        }
        parts.reverse();
        parts.join(" > ")
    }

    /// Find a section by heading, or by full heading path when ambiguous.
    pub fn find(&self, heading: &str) -> Option<SectionId> {
        let wanted = heading.trim();
        self.ids()
            .find(|id| self.heading_path(*id) == wanted)
            .or_else(|| self.ids().find(|id| self.nodes[id.0].heading == wanted))
    }

    /// Replace a section's sources, e.g. with discovered references.
    pub fn set_sources(&mut self, id: SectionId, sources: Vec<SourceRef>) {
        self.nodes[id.0].sources = sources;
    }
}
