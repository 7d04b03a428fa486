//! Source resolution: patterns to files, files to cached content.
mod cache;
mod resolve;

pub use cache::SourceCache;
pub use resolve::SourceResolver;

use crate::template::{SectionId, SectionTree, SourceRef};
use std::path::PathBuf;
use std::rc::Rc;

/// A concrete file with its content, read once per run.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub path: String,
    pub content: Rc<str>,
}

/// The sources one section ends up with after resolution and discovery.
#[derive(Debug, Clone, Default)]
pub struct SectionSources {
    /// Declared patterns or discovered references, in template order.
    pub refs: Vec<SourceRef>,
    /// Concrete root-relative files those references expand to.
    pub files: Vec<PathBuf>,
    /// Declared patterns that matched nothing.
    pub unmatched: Vec<String>,
}

/// Per-section sources for a whole tree, indexed by [`SectionId`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedSections {
    sections: Vec<SectionSources>,
}

impl ResolvedSections {
    pub fn new(tree: &SectionTree) -> Self {
        Self {
            sections: vec![SectionSources::default(); tree.len()],
        }
    }

    pub fn get(&self, id: SectionId) -> &SectionSources {
        &self.sections[id.index()]
    }

    pub fn set(&mut self, id: SectionId, sources: SectionSources) {
        self.sections[id.index()] = sources;
    }
}
