//! Template JSON loading.
//!
//! The raw document is accepted loosely (aliases, string-or-object sources)
//! and converted once into a [`SectionTree`]; nothing downstream sees the raw
//! form.
use super::model::{DiscoveryMethod, Section, SectionId, SectionTree, SourceRef};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub sections: Vec<RawSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSection {
    #[serde(alias = "heading")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<RawSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_words: Option<usize>,
    #[serde(default, alias = "children", skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<RawSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawSource {
    Pattern(String),
    Detailed {
        #[serde(alias = "pattern")]
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<DiscoveryMethod>,
    },
}

/// Read and convert a template file.
pub fn load_template(path: &Path) -> Result<SectionTree> {
    let bytes = fs::read(path).with_context(|| format!("read template {}", path.display()))?;
    let raw: RawTemplate = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse template JSON {}", path.display()))?;
    build_tree(raw).with_context(|| format!("load template {}", path.display()))
}

/// Convert a raw template into the strict arena form.
pub fn build_tree(raw: RawTemplate) -> Result<SectionTree> {
    if raw.sections.is_empty() {
        return Err(anyhow!("template has no sections"));
    }
    let mut tree = SectionTree {
        title: normalized_text(raw.title),
        output: normalized_text(raw.output),
        nodes: Vec::new(),
        roots: Vec::new(),
    };
    check_sibling_headings(&raw.sections, "top level")?;

    // Worklist of (raw section, parent, level); ids are assigned in pre-order
    // so arena order matches document order.
    let mut stack: Vec<(RawSection, Option<SectionId>, usize)> = raw
        .sections
        .into_iter()
        .rev()
        .map(|section| (section, None, 1))
        .collect();
    while let Some((raw_section, parent, level)) = stack.pop() {
        let heading = raw_section.title.trim().to_string();
        if heading.is_empty() {
            return Err(anyhow!("section heading must be non-empty (level {level})"));
        }
        check_sibling_headings(&raw_section.sections, &heading)?;
        let sources = raw_section
            .sources
            .into_iter()
            .map(|source| convert_source(source, &heading))
            .collect::<Result<Vec<_>>>()?;
        let id = SectionId(tree.nodes.len());
        tree.nodes.push(Section {
            heading,
            level,
            prompt: raw_section.prompt.unwrap_or_default().trim().to_string(),
            sources,
            max_words: raw_section.max_words.filter(|words| *words > 0),
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => tree.nodes[parent.0].children.push(id),
            None => tree.roots.push(id),
        }
        for child in raw_section.sections.into_iter().rev() {
            stack.push((child, Some(id), level + 1));
        }
    }
    Ok(tree)
}

/// Convert the tree back into the raw form, e.g. to persist discovered sources.
pub fn to_raw(tree: &SectionTree) -> RawTemplate {
    // Children are collected bottom-up: walk pre-order in reverse so every
    // child is finished before its parent is assembled.
    let order = tree.preorder();
    let mut built: Vec<Option<RawSection>> = vec![None; tree.len()];
    for id in order.iter().rev() {
        let section = tree.get(*id);
        let sections = section
            .children
            .iter()
            .filter_map(|child| built[child.index()].take())
            .collect();
        built[id.index()] = Some(RawSection {
            title: section.heading.clone(),
            prompt: Some(section.prompt.clone()).filter(|prompt| !prompt.is_empty()),
            sources: section.sources.iter().map(raw_source).collect(),
            max_words: section.max_words,
            sections,
        });
    }
    RawTemplate {
        title: tree.title.clone(),
        output: tree.output.clone(),
        sections: tree
            .roots()
            .iter()
            .filter_map(|root| built[root.index()].take())
            .collect(),
    }
}

fn raw_source(source: &SourceRef) -> RawSource {
    if source.is_declared() {
        return RawSource::Pattern(source.pattern().to_string());
    }
    RawSource::Detailed {
        path: source.pattern().to_string(),
        reasoning: source.reasoning().map(str::to_string),
        score: source.score(),
        method: Some(source.method()),
    }
}

fn convert_source(source: RawSource, heading: &str) -> Result<SourceRef> {
    match source {
        RawSource::Pattern(pattern) => declared_pattern(pattern, heading),
        RawSource::Detailed {
            path,
            reasoning,
            score,
            method,
        } => {
            let method = method.unwrap_or(if score.is_some() || reasoning.is_some() {
                DiscoveryMethod::Llm
            } else {
                DiscoveryMethod::Declared
            });
            if method == DiscoveryMethod::Declared {
                if score.is_some() || reasoning.is_some() {
                    return Err(anyhow!(
                        "section {heading:?}: declared source {path:?} must not carry score or reasoning"
                    ));
                }
                return declared_pattern(path, heading);
            }
            let (Some(score), Some(reasoning)) = (score, reasoning) else {
                return Err(anyhow!(
                    "section {heading:?}: discovered source {path:?} needs both score and reasoning"
                ));
            };
            if !(0.0..=10.0).contains(&score) {
                return Err(anyhow!(
                    "section {heading:?}: source {path:?} score {score} outside 0..=10"
                ));
            }
            let path = path.trim().to_string();
            if path.is_empty() {
                return Err(anyhow!("section {heading:?}: discovered source path is empty"));
            }
            Ok(SourceRef::discovered(path, score, reasoning, method))
        }
    }
}

fn declared_pattern(pattern: String, heading: &str) -> Result<SourceRef> {
    let pattern = pattern.trim().to_string();
    if Path::new(&pattern).is_absolute() {
        return Err(anyhow!(
            "section {heading:?}: source {pattern:?} must be relative to the project root"
        ));
    }
    // Empty patterns are kept: they resolve to nothing and fail validation
    // with the section named.
    Ok(SourceRef::declared(pattern))
}

fn check_sibling_headings(sections: &[RawSection], parent: &str) -> Result<()> {
    let mut seen = BTreeSet::new();
    for section in sections {
        let heading = section.title.trim();
        if !seen.insert(heading) {
            return Err(anyhow!(
                "duplicate section heading {heading:?} under {parent}"
            ));
        }
    }
    Ok(())
}

fn normalized_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
