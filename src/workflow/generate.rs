//! Workflow generate step.
//!
//! Resolve and discover sources, refuse to start unless every section has
//! some, then generate the tree in order. Whatever finished is always kept:
//! a failed or interrupted run writes `FILE.partial` and exits non-zero.
use super::context::RunContext;
use crate::cli::GenerateArgs;
use crate::engine::{
    render_markdown, sources_map, EngineSettings, GenerationEngine, NodeState, RunStatus,
};
use crate::backend::lm_log::{load_lm_log, LmOutcome};
use crate::output::{partial_path, write_json_atomic, write_text_atomic};
use anyhow::{anyhow, Error, Result};
use std::path::{Path, PathBuf};

pub fn run_generate(args: &GenerateArgs) -> Result<()> {
    let mut ctx = RunContext::load(&args.common)?;
    let prepared = ctx.prepare();
    prepared.validation.into_result()?;
    ctx.backend.ensure_available()?;

    let out: Option<PathBuf> = args.out.clone().or_else(|| {
        ctx.tree
            .output
            .as_ref()
            .map(|output| ctx.resolver.root().join(output))
    });
    let settings = EngineSettings {
        retry: ctx.config.lm.retry_policy(),
        context: ctx.config.context.clone(),
        generation: ctx.config.generation.clone(),
        verbose: ctx.verbose,
    };
    let limit = args.max_sections;
    let should_stop = move |completed: usize| limit.is_some_and(|max| completed >= max);

    let engine = GenerationEngine::new(&ctx.tree, &prepared.resolved, &ctx.backend, settings);
    let outcome = engine.run(&mut ctx.cache, &should_stop);
    let markdown = render_markdown(&outcome.document);

    if outcome.context_truncations > 0 {
        tracing::info!(
            dropped = outcome.context_truncations,
            "context summaries dropped to stay within budget"
        );
    }
    if let Some(path) = &args.sources_map {
        let map = sources_map(&ctx.tree, &prepared.resolved, &outcome.document);
        write_json_atomic(path, &map)?;
        if ctx.verbose {
            eprintln!("wrote {}", path.display());
        }
    }
    tracing::info!(
        files_read = ctx.cache.reads(),
        sections = outcome.document.sections.len(),
        "generation run finished"
    );
    if ctx.verbose {
        if let Some(log) = ctx.backend.log() {
            report_lm_log(log.path());
        }
    }

    let written = match &out {
        Some(path) => {
            let target = if outcome.is_complete() {
                path.clone()
            } else {
                partial_path(path)
            };
            write_text_atomic(&target, &markdown)?;
            Some(target)
        }
        None => {
            print!("{markdown}");
            None
        }
    };
    if ctx.verbose {
        if let Some(path) = &written {
            eprintln!("wrote {}", path.display());
        }
    }

    let total = outcome.states.len();
    let done = outcome.document.sections.len();
    let kept = match &written {
        Some(path) => format!(
            "partial document ({done} of {total} sections) written to {}",
            path.display()
        ),
        None => format!("partial document ({done} of {total} sections) printed to stdout"),
    };
    let next_pending = ctx
        .tree
        .preorder()
        .into_iter()
        .find(|id| outcome.state(*id) == NodeState::Pending)
        .map(|id| ctx.tree.heading_path(id))
        .unwrap_or_default();
    match outcome.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Failed(error) => Err(Error::new(error).context(kept)),
        RunStatus::Interrupted => Err(anyhow!(
            "generation stopped before section {next_pending:?} (--max-sections); {kept}"
        )),
    }
}

fn report_lm_log(path: &Path) {
    match load_lm_log(path) {
        Ok(entries) => {
            let failed = entries
                .iter()
                .filter(|entry| entry.outcome == LmOutcome::Failed)
                .count();
            eprintln!(
                "lm log: {} ({} entries, {failed} failed)",
                path.display(),
                entries.len()
            );
        }
        Err(err) => eprintln!("lm log: {} (unreadable: {err:#})", path.display()),
    }
}
