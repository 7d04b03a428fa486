//! Document assembly and the sources map.
use super::GeneratedDocument;
use crate::sources::ResolvedSections;
use crate::template::SectionTree;
use crate::util::rel_path_string;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const MAX_HEADING_DEPTH: usize = 6;

/// Markdown depth of a section; a document title takes `#`.
pub fn heading_depth(level: usize, has_title: bool) -> usize {
    (level + usize::from(has_title)).clamp(1, MAX_HEADING_DEPTH)
}

/// Pre-order concatenation of headings and generated bodies.
pub fn render_markdown(document: &GeneratedDocument) -> String {
    let has_title = document.title.is_some();
    let mut out = String::new();
    if let Some(title) = &document.title {
        out.push_str(&format!("# {title}\n\n"));
    }
    for section in &document.sections {
        let depth = heading_depth(section.level, has_title);
        out.push_str(&format!("{} {}\n\n", "#".repeat(depth), section.heading));
        if !section.content.is_empty() {
            out.push_str(&section.content);
            out.push_str("\n\n");
        }
    }
    let trimmed = out.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcesMapEntry {
    pub sources_used: Vec<String>,
    /// Why each source is there: discovery reasoning, or the declaring pattern.
    pub reasoning: BTreeMap<String, String>,
}

/// `{heading: {sources_used, reasoning}}` for every generated section.
///
/// Headings that occur more than once in the tree are keyed by heading path.
pub fn sources_map(
    tree: &SectionTree,
    resolved: &ResolvedSections,
    document: &GeneratedDocument,
) -> BTreeMap<String, SourcesMapEntry> {
    let mut heading_counts: HashMap<&str, usize> = HashMap::new();
    for id in tree.ids() {
        *heading_counts.entry(tree.get(id).heading.as_str()).or_insert(0) += 1;
    }

    let mut map = BTreeMap::new();
    for section in &document.sections {
        let sources = resolved.get(section.id);
        let mut reasoning = BTreeMap::new();
        for source in &sources.refs {
            let why = match source.reasoning() {
                Some(reason) => reason.to_string(),
                None => "declared in template".to_string(),
            };
            reasoning.insert(source.pattern().to_string(), why);
        }
        let key = if heading_counts.get(section.heading.as_str()).copied().unwrap_or(0) > 1 {
            section.heading_path.clone()
        } else {
            section.heading.clone()
        };
        map.insert(
            key,
            SourcesMapEntry {
                sources_used: sources.files.iter().map(|path| rel_path_string(path)).collect(),
                reasoning,
            },
        );
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeneratedSection;
    use crate::sources::SectionSources;
    use crate::template::{tree_from_json, DiscoveryMethod, SourceRef};
    use std::path::PathBuf;

    fn section(tree: &SectionTree, heading: &str, content: &str) -> GeneratedSection {
        let id = tree.find(heading).expect("section");
        GeneratedSection {
            id,
            heading: tree.get(id).heading.clone(),
            heading_path: tree.heading_path(id),
            level: tree.get(id).level,
            content: content.to_string(),
            summary: String::new(),
        }
    }

    #[test]
    fn title_shifts_section_headings() {
        let tree = tree_from_json(
            r#"{"title": "Manual", "sections": [
                {"title": "Guide", "sources": ["a"], "sections": [{"title": "Setup", "sources": ["b"]}]}
            ]}"#,
        );
        let document = GeneratedDocument {
            title: tree.title.clone(),
            sections: vec![section(&tree, "Guide", "Intro."), section(&tree, "Setup", "Steps.")],
        };
        assert_eq!(
            render_markdown(&document),
            "# Manual\n\n## Guide\n\nIntro.\n\n### Setup\n\nSteps.\n"
        );
    }

    #[test]
    fn untitled_documents_start_at_level_one() {
        let tree = tree_from_json(r#"{"sections": [{"title": "A", "sources": ["a"]}]}"#);
        let document = GeneratedDocument {
            title: None,
            sections: vec![section(&tree, "A", "Body.")],
        };
        assert_eq!(render_markdown(&document), "# A\n\nBody.\n");
    }

    #[test]
    fn sources_map_carries_reasoning_and_disambiguates_headings() {
        let tree = tree_from_json(
            r#"{"sections": [
                {"title": "Server", "sources": ["srv.rs"], "sections": [{"title": "Config", "sources": ["srv.toml"]}]},
                {"title": "Client", "sources": ["cli.rs"], "sections": [{"title": "Config", "sources": ["cli.toml"]}]}
            ]}"#,
        );
        let mut resolved = ResolvedSections::new(&tree);
        let server = tree.find("Server").expect("server");
        resolved.set(
            server,
            SectionSources {
                refs: vec![SourceRef::discovered(
                    "srv.rs",
                    8.0,
                    "defines the server",
                    DiscoveryMethod::Llm,
                )],
                files: vec![PathBuf::from("srv.rs")],
                unmatched: Vec::new(),
            },
        );
        let server_config = tree.find("Server > Config").expect("server config");
        resolved.set(
            server_config,
            SectionSources {
                refs: vec![SourceRef::declared("srv.toml")],
                files: vec![PathBuf::from("srv.toml")],
                unmatched: Vec::new(),
            },
        );
        let document = GeneratedDocument {
            title: None,
            sections: vec![
                section(&tree, "Server", "S."),
                section(&tree, "Server > Config", "C."),
            ],
        };
        let map = sources_map(&tree, &resolved, &document);
        assert_eq!(map["Server"].sources_used, vec!["srv.rs"]);
        assert_eq!(map["Server"].reasoning["srv.rs"], "defines the server");
        assert_eq!(map["Server > Config"].reasoning["srv.toml"], "declared in template");
    }
}
