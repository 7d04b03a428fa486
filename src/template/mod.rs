//! Documentation outline: loading and the strict section tree.
mod load;
mod model;

pub use load::{load_template, to_raw};
pub use model::{DiscoveryMethod, Section, SectionId, SectionTree, SourceRef};

#[cfg(test)]
pub use load::{build_tree, RawTemplate};

/// Build a tree from inline JSON in tests.
#[cfg(test)]
pub fn tree_from_json(json: &str) -> SectionTree {
    let raw: RawTemplate = serde_json::from_str(json).expect("template JSON");
    build_tree(raw).expect("build tree")
}
