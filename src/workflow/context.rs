use crate::backend::lm_log::LmLog;
use crate::backend::{LmCommandBackend, RelevanceScorer};
use crate::cli::CommonArgs;
use crate::config::{resolve_config, resolve_lm_command, Config};
use crate::discovery::{DiscoveryPipeline, DiscoveryReport, SectionQuery};
use crate::error::ResolutionError;
use crate::preflight::{self, ValidationResult};
use crate::sources::{ResolvedSections, SectionSources, SourceCache, SourceResolver};
use crate::template::{load_template, SectionId, SectionTree};
use anyhow::Result;
use std::path::PathBuf;

/// Everything a command needs once the template and config are loaded.
pub(crate) struct RunContext {
    pub(crate) template_path: PathBuf,
    pub(crate) tree: SectionTree,
    pub(crate) config: Config,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) resolver: SourceResolver,
    pub(crate) cache: SourceCache,
    pub(crate) backend: LmCommandBackend,
    pub(crate) verbose: bool,
}

impl RunContext {
    pub(crate) fn load(args: &CommonArgs) -> Result<Self> {
        let tree = load_template(&args.template)?;
        let (mut config, config_path) = resolve_config(args.config.as_deref(), &args.root)?;
        if args.no_discover {
            config.discovery.enabled = false;
        }
        if args.no_llm_scoring {
            config.discovery.llm_scoring = false;
        }
        let resolver = SourceResolver::new(&args.root, &config.resolver, args.include_excluded)?;
        let cache = SourceCache::new(resolver.root(), config.resolver.max_file_bytes);

        let command = resolve_lm_command(args.lm.as_deref(), &config.lm);
        let mut backend = LmCommandBackend::new(&command, config.lm.scoring_command.as_deref())?;
        if let Some(path) = &args.lm_log {
            backend = backend.with_log(LmLog::new(path.clone()));
        }
        if args.verbose {
            match &config_path {
                Some(path) => eprintln!("config: {}", path.display()),
                None => eprintln!("config: defaults"),
            }
            eprintln!("root: {}", resolver.root().display());
        }

        Ok(Self {
            template_path: args.template.clone(),
            tree,
            config,
            config_path,
            resolver,
            cache,
            backend,
            verbose: args.verbose,
        })
    }

    /// Expand every declared pattern; unmatched patterns are kept for reporting.
    pub(crate) fn resolve_declared(&self) -> ResolvedSections {
        let mut resolved = ResolvedSections::new(&self.tree);
        for id in self.tree.preorder() {
            let section = self.tree.get(id);
            if section.sources.is_empty() {
                continue;
            }
            let mut files = Vec::new();
            let mut unmatched = Vec::new();
            for source in &section.sources {
                let pattern = source.pattern();
                let error = match self.resolver.resolve(pattern) {
                    Ok(matches) if !matches.is_empty() => {
                        files.extend(matches);
                        continue;
                    }
                    Ok(_) => ResolutionError::NoMatches {
                        pattern: pattern.to_string(),
                    },
                    Err(err) => err,
                };
                tracing::warn!(section = %self.tree.heading_path(id), "{error}");
                unmatched.push(pattern.to_string());
            }
            files.sort();
            files.dedup();
            resolved.set(
                id,
                SectionSources {
                    refs: section.sources.clone(),
                    files,
                    unmatched,
                },
            );
        }
        resolved
    }

    /// Sections that declare no sources, or none when discovery is disabled.
    pub(crate) fn discovery_targets(&self) -> Vec<SectionId> {
        let targets: Vec<SectionId> = self
            .tree
            .preorder()
            .into_iter()
            .filter(|id| self.tree.get(*id).wants_discovery())
            .collect();
        if !self.config.discovery.enabled {
            if !targets.is_empty() {
                tracing::info!(
                    sections = targets.len(),
                    "discovery disabled; sections without declared sources stay empty"
                );
            }
            return Vec::new();
        }
        targets
    }

    /// Run discovery for `targets`, recording the selection in both the tree
    /// and `resolved`.
    pub(crate) fn discover(
        &mut self,
        targets: &[SectionId],
        resolved: &mut ResolvedSections,
    ) -> Vec<(SectionId, DiscoveryReport)> {
        let scorer: Option<&dyn RelevanceScorer> = if self.config.discovery.llm_scoring {
            Some(&self.backend)
        } else {
            None
        };
        let pipeline = DiscoveryPipeline::new(&self.config.discovery, scorer);
        let mut reports = Vec::with_capacity(targets.len());
        for (index, id) in targets.iter().copied().enumerate() {
            let query = SectionQuery::for_section(&self.tree, id);
            if self.verbose {
                eprintln!(
                    "discover: [{}/{}] {}",
                    index + 1,
                    targets.len(),
                    query.heading_path
                );
            }
            let report = pipeline.discover(&query, self.resolver.files(), &mut self.cache);
            if report.selected.is_empty() {
                tracing::warn!(section = %query.heading_path, "discovery found no relevant files");
            }
            let refs = report.source_refs();
            self.tree.set_sources(id, refs.clone());
            resolved.set(
                id,
                SectionSources {
                    refs,
                    files: report.files(),
                    unmatched: Vec::new(),
                },
            );
            reports.push((id, report));
        }
        reports
    }

    pub(crate) fn validate(&self, resolved: &ResolvedSections) -> ValidationResult {
        preflight::validate(&self.tree, resolved)
    }

    /// Resolve, discover, and validate: the shared front half of every run.
    pub(crate) fn prepare(&mut self) -> Prepared {
        let mut resolved = self.resolve_declared();
        let targets = self.discovery_targets();
        // Declared sources are final: if they already fail, stop before
        // discovery makes any scoring call.
        let declared =
            preflight::validate_where(&self.tree, &resolved, |id| !targets.contains(&id));
        if !declared.passed {
            if !targets.is_empty() {
                tracing::info!(
                    sections = targets.len(),
                    "declared sources fail validation; discovery skipped"
                );
            }
            return Prepared {
                resolved,
                discovery: Vec::new(),
                validation: declared,
            };
        }
        let discovery = self.discover(&targets, &mut resolved);
        let validation = self.validate(&resolved);
        Prepared {
            resolved,
            discovery,
            validation,
        }
    }
}

pub(crate) struct Prepared {
    pub(crate) resolved: ResolvedSections,
    pub(crate) discovery: Vec<(SectionId, DiscoveryReport)>,
    pub(crate) validation: ValidationResult,
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
