//! Pattern resolution against a single project root.
//!
//! Patterns are exact relative paths or globs (`*`, `**`, `?`, `[..]`,
//! `{a,b}`); results are root-relative, sorted, and deduplicated.
use crate::config::ResolverConfig;
use crate::error::ResolutionError;
use crate::util::{has_parent_components, rel_path_string};
use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories skipped unless the caller opts out of default excludes.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "target",
    "node_modules",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".idea",
    ".vscode",
];

const GLOB_META: &[char] = &['*', '?', '[', '{'];

pub struct SourceResolver {
    root: PathBuf,
    excluded_dirs: Vec<String>,
    exclude_set: GlobSet,
    follow_symlinks: bool,
    snapshot: OnceCell<Vec<PathBuf>>,
}

impl SourceResolver {
    /// Build a resolver; `include_excluded` disables the default directory excludes.
    pub fn new(root: &Path, config: &ResolverConfig, include_excluded: bool) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("resolve project root {}", root.display()))?;
        let excluded_dirs = if config.use_default_excludes && !include_excluded {
            DEFAULT_EXCLUDED_DIRS.iter().map(|dir| dir.to_string()).collect()
        } else {
            Vec::new()
        };
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_globs {
            builder.add(
                Glob::new(pattern).with_context(|| format!("exclude glob {pattern:?}"))?,
            );
        }
        let exclude_set = builder.build().context("build exclude globs")?;
        Ok(Self {
            root,
            excluded_dirs,
            exclude_set,
            follow_symlinks: config.follow_symlinks,
            snapshot: OnceCell::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every non-excluded file under the root, relative and sorted.
    ///
    /// The walk happens once; later calls reuse the snapshot.
    pub fn files(&self) -> &[PathBuf] {
        self.snapshot.get_or_init(|| self.walk())
    }

    /// Expand one pattern. No match is an empty list, not an error.
    pub fn resolve(&self, pattern: &str) -> Result<Vec<PathBuf>, ResolutionError> {
        let pattern = pattern.trim().trim_start_matches("./");
        if pattern.is_empty() || has_parent_components(Path::new(pattern)) {
            return Ok(Vec::new());
        }
        if !pattern.contains(GLOB_META) {
            return Ok(self.resolve_exact(pattern));
        }
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| ResolutionError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();
        let mut matches: Vec<PathBuf> = self
            .files()
            .iter()
            .filter(|path| matcher.is_match(rel_path_string(path)))
            .cloned()
            .collect();
        matches.sort();
        matches.dedup();
        Ok(matches)
    }

    fn resolve_exact(&self, pattern: &str) -> Vec<PathBuf> {
        let rel = PathBuf::from(pattern);
        let absolute = self.root.join(&rel);
        if absolute.is_file() {
            // An explicitly named file wins over directory excludes.
            return vec![rel];
        }
        if absolute.is_dir() {
            let prefix = rel_path_string(&rel);
            return self
                .files()
                .iter()
                .filter(|path| rel_path_string(path).starts_with(&format!("{prefix}/")))
                .cloned()
                .collect();
        }
        Vec::new()
    }

    fn is_excluded_dir(&self, name: &str, rel: &str) -> bool {
        self.excluded_dirs.iter().any(|dir| dir == name) || self.exclude_set.is_match(rel)
    }

    fn walk(&self) -> Vec<PathBuf> {
        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .map(rel_path_string)
                    .unwrap_or_default();
                let name = entry.file_name().to_string_lossy();
                !self.is_excluded_dir(&name, &rel)
            });
        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skip unreadable path during walk");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if self.exclude_set.is_match(rel_path_string(rel)) {
                continue;
            }
            files.push(rel.to_path_buf());
        }
        files.sort();
        tracing::debug!(files = files.len(), root = %self.root.display(), "repository snapshot");
        files
    }
}
