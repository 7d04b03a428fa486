//! Stage 1: path heuristics over the whole inventory.
//!
//! No file content is read here. Every documentable file becomes a
//! candidate; the score only orders them so the cap keeps the likeliest.
use super::terms::extract_terms;
use super::topics::hinted_fragments;
use super::{sort_candidates, Candidate, SectionQuery};
use crate::template::DiscoveryMethod;
use crate::util::rel_path_string;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const NAME_HIT: f32 = 3.0;
const DIR_HIT: f32 = 1.5;
const FRAGMENT_HIT: f32 = 1.0;
const PROJECT_DOC_BASE: f32 = 1.0;

const DOC_EXTENSIONS: &[&str] = &[
    "rs", "py", "pyi", "js", "jsx", "mjs", "cjs", "ts", "tsx", "go", "java", "kt", "kts", "rb",
    "php", "c", "h", "cc", "cpp", "hpp", "cs", "swift", "scala", "sh", "bash", "zsh", "fish",
    "ps1", "lua", "ex", "exs", "erl", "hs", "ml", "clj", "dart", "r", "jl", "zig", "nim", "nix",
    "md", "markdown", "rst", "txt", "adoc", "org", "toml", "yaml", "yml", "json", "ini", "cfg",
    "conf", "env", "sql", "graphql", "proto", "html", "css", "scss", "vue", "svelte", "tf",
    "xml", "gradle", "cmake", "mk",
];

const WELL_KNOWN_NAMES: &[&str] = &[
    "readme", "license", "copying", "makefile", "justfile", "dockerfile", "procfile",
    "contributing", "changelog", "authors", "gemfile", "rakefile", "vagrantfile", "pipfile",
];

const SKIPPED_NAMES: &[&str] = &[
    "cargo.lock", "package-lock.json", "yarn.lock", "pnpm-lock.yaml", "poetry.lock",
    "pipfile.lock", "composer.lock", "gemfile.lock", "go.sum", "flake.lock", "uv.lock",
];

/// Source, doc, and config files worth showing to a writer.
fn is_documentable(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|name| name.to_string_lossy().to_lowercase()) else {
        return false;
    };
    if SKIPPED_NAMES.contains(&name.as_str())
        || name.ends_with(".min.js")
        || name.ends_with(".min.css")
        || name.ends_with(".map")
    {
        return false;
    }
    let base = name.split('.').next().unwrap_or_default();
    if WELL_KNOWN_NAMES.contains(&base) {
        return true;
    }
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| DOC_EXTENSIONS.contains(&ext.as_str()))
}

fn is_project_doc(rel: &str) -> bool {
    let lower = rel.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or_default();
    name.starts_with("readme") || lower.starts_with("docs/") || lower.contains("/docs/")
}

/// Score one path against the query terms and hinted fragments.
pub(super) fn path_score(
    rel: &str,
    query_terms: &BTreeSet<String>,
    fragments: &[&str],
) -> (f32, Vec<String>) {
    let path = Path::new(rel);
    let stem_terms: BTreeSet<String> = path
        .file_stem()
        .map(|stem| extract_terms(&stem.to_string_lossy()))
        .unwrap_or_default()
        .into_iter()
        .collect();
    let dir_terms: BTreeSet<String> = path
        .parent()
        .map(|parent| extract_terms(&rel_path_string(parent)))
        .unwrap_or_default()
        .into_iter()
        .collect();

    let mut score = 0.0;
    let mut reasons = Vec::new();
    for term in query_terms {
        if stem_terms.contains(term) {
            score += NAME_HIT;
            reasons.push(format!("name matches '{term}'"));
        } else if dir_terms.contains(term) {
            score += DIR_HIT;
            reasons.push(format!("directory matches '{term}'"));
        }
    }
    let lower = rel.to_lowercase();
    let hinted: Vec<&str> = fragments
        .iter()
        .copied()
        .filter(|fragment| lower.contains(fragment))
        .collect();
    if !hinted.is_empty() {
        score += FRAGMENT_HIT * hinted.len() as f32;
        reasons.push(format!("path hints {}", hinted.join(", ")));
    }
    if is_project_doc(rel) {
        score += PROJECT_DOC_BASE;
        reasons.push("project documentation".to_string());
    }
    (score, reasons)
}

pub(super) fn query_terms(query: &SectionQuery) -> BTreeSet<String> {
    extract_terms(&query.text()).into_iter().collect()
}

pub(super) fn match_paths(
    query: &SectionQuery,
    inventory: &[PathBuf],
    limit: usize,
) -> Vec<Candidate> {
    let terms = query_terms(query);
    let term_list: Vec<&str> = terms.iter().map(String::as_str).collect();
    let fragments = hinted_fragments(&term_list);

    let mut candidates: Vec<Candidate> = inventory
        .iter()
        .filter(|path| is_documentable(path))
        .map(|path| {
            let rel = rel_path_string(path);
            let (score, reasons) = path_score(&rel, &terms, &fragments);
            let reasoning = if reasons.is_empty() {
                "documentable file with no path signal".to_string()
            } else {
                reasons.join("; ")
            };
            Candidate {
                path: rel,
                score,
                reasoning,
                method: DiscoveryMethod::Pattern,
            }
        })
        .collect();
    sort_candidates(&mut candidates);
    candidates.truncate(limit);
    candidates
}
