//! Nesting- and sibling-aware prompt composition.
use crate::backend::GenerationConstraints;
use crate::prompts::{NESTING_PROMPT_MD, SIBLINGS_PROMPT_MD};
use crate::template::{SectionId, SectionTree};
use crate::util::fill_placeholders;

fn bullet_list<'a>(headings: impl Iterator<Item = &'a str>) -> String {
    headings
        .map(|heading| format!("- \"{heading}\""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The author's prompt plus structural instructions for this node.
///
/// A node with children always lists every child heading verbatim so the
/// backend leaves their material alone.
pub fn compose_prompt(tree: &SectionTree, id: SectionId) -> String {
    let section = tree.get(id);
    let mut parts = Vec::new();
    let own = section.prompt.trim();
    if own.is_empty() {
        parts.push(format!("Write the \"{}\" section.", section.heading));
    } else {
        parts.push(own.to_string());
    }

    let siblings = tree.siblings(id);
    if !siblings.is_empty() {
        let parent = section
            .parent
            .map(|parent| tree.get(parent).heading.as_str())
            .or(tree.title.as_deref())
            .unwrap_or("the document");
        let listed = bullet_list(siblings.iter().map(|sibling| tree.get(*sibling).heading.as_str()));
        parts.push(
            fill_placeholders(SIBLINGS_PROMPT_MD, &[("parent", parent), ("siblings", listed.as_str())])
                .trim_end()
                .to_string(),
        );
    }

    if section.has_children() {
        let listed = bullet_list(section.children.iter().map(|child| tree.get(*child).heading.as_str()));
        parts.push(
            fill_placeholders(NESTING_PROMPT_MD, &[("children", listed.as_str())])
                .trim_end()
                .to_string(),
        );
    }

    if let Some(max_words) = section.max_words {
        parts.push(format!("Keep this section under {max_words} words."));
    }
    parts.join("\n\n")
}

pub fn constraints_for(tree: &SectionTree, id: SectionId) -> GenerationConstraints {
    let section = tree.get(id);
    GenerationConstraints {
        heading_level: section.level,
        max_words: section.max_words,
        avoid_headings: section
            .children
            .iter()
            .map(|child| tree.get(*child).heading.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::tree_from_json;

    const GUIDE: &str = r#"{"title": "Manual", "sections": [
        {"title": "Guide", "prompt": "Introduce the guide.", "sources": ["README.md"], "sections": [
            {"title": "Setup", "sources": ["setup.py"], "max_words": 120},
            {"title": "Config", "prompt": "Explain config.", "sources": ["config.toml"]}
        ]},
        {"title": "FAQ", "sources": ["FAQ.md"]}
    ]}"#;

    #[test]
    fn parent_prompt_lists_every_child_heading() {
        let tree = tree_from_json(GUIDE);
        let guide = tree.find("Guide").expect("guide");
        let prompt = compose_prompt(&tree, guide);
        assert!(prompt.starts_with("Introduce the guide."));
        assert!(prompt.contains("\"Setup\""));
        assert!(prompt.contains("\"Config\""));
        assert!(prompt.contains("Do not cover material"));
        assert_eq!(
            constraints_for(&tree, guide).avoid_headings,
            vec!["Setup", "Config"]
        );
    }

    #[test]
    fn leaf_prompt_has_no_nesting_instruction() {
        let tree = tree_from_json(GUIDE);
        let setup = tree.find("Setup").expect("setup");
        let prompt = compose_prompt(&tree, setup);
        assert!(prompt.starts_with("Write the \"Setup\" section."));
        assert!(!prompt.contains("Do not cover material"));
        assert!(prompt.contains("part of \"Guide\""));
        assert!(prompt.contains("- \"Config\""));
        assert!(prompt.contains("under 120 words"));
        let constraints = constraints_for(&tree, setup);
        assert_eq!(constraints.heading_level, 2);
        assert_eq!(constraints.max_words, Some(120));
        assert!(constraints.avoid_headings.is_empty());
    }

    #[test]
    fn top_level_siblings_name_the_document() {
        let tree = tree_from_json(GUIDE);
        let faq = tree.find("FAQ").expect("faq");
        let prompt = compose_prompt(&tree, faq);
        assert!(prompt.contains("part of \"Manual\""));
        assert!(prompt.contains("- \"Guide\""));
    }

    #[test]
    fn parent_heading_with_braces_is_not_expanded() {
        let tree = tree_from_json(
            r#"{"sections": [{"title": "The {siblings} list", "sources": ["a.md"], "sections": [
                {"title": "One", "sources": ["one.md"]},
                {"title": "Two", "sources": ["two.md"]}
            ]}]}"#,
        );
        let one = tree.find("One").expect("one");
        let prompt = compose_prompt(&tree, one);
        assert!(prompt.contains("part of \"The {siblings} list\""));
        assert_eq!(prompt.matches("- \"Two\"").count(), 1);
    }
}
