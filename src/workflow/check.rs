//! Workflow check step.
//!
//! Runs resolution, discovery and validation exactly as `generate` would,
//! then reports per-section sources. The generation backend is never called.
use super::context::RunContext;
use crate::cli::CheckArgs;
use crate::discovery::DiscoveryReport;
use crate::preflight::ValidationResult;
use crate::util::{display_path, rel_path_string};
use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Serialize)]
struct CheckSummary<'a> {
    template: String,
    root: String,
    config: Option<String>,
    sections: Vec<SectionSummary>,
    discovery: Vec<&'a DiscoveryReport>,
    validation: &'a ValidationResult,
}

#[derive(Serialize)]
struct SectionSummary {
    heading_path: String,
    level: usize,
    discovered: bool,
    files: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unmatched_patterns: Vec<String>,
}

pub fn run_check(args: &CheckArgs) -> Result<()> {
    let mut ctx = RunContext::load(&args.common)?;
    let prepared = ctx.prepare();

    let sections: Vec<SectionSummary> = ctx
        .tree
        .preorder()
        .into_iter()
        .map(|id| {
            let sources = prepared.resolved.get(id);
            SectionSummary {
                heading_path: ctx.tree.heading_path(id),
                level: ctx.tree.get(id).level,
                discovered: prepared.discovery.iter().any(|(found, _)| *found == id),
                files: sources.files.iter().map(|file| rel_path_string(file)).collect(),
                unmatched_patterns: sources.unmatched.clone(),
            }
        })
        .collect();

    if args.json {
        let summary = CheckSummary {
            template: display_path(&ctx.template_path, None),
            root: display_path(ctx.resolver.root(), None),
            config: ctx.config_path.as_deref().map(|path| display_path(path, None)),
            sections,
            discovery: prepared.discovery.iter().map(|(_, report)| report).collect(),
            validation: &prepared.validation,
        };
        let text = serde_json::to_string_pretty(&summary).context("serialize check summary")?;
        println!("{text}");
    } else {
        print_sections(&sections);
        if prepared.validation.passed {
            println!(
                "ok: all {} sections have sources",
                prepared.validation.sections_checked
            );
        }
    }

    prepared.validation.into_result()?;
    Ok(())
}

fn print_sections(sections: &[SectionSummary]) {
    for section in sections {
        let indent = "  ".repeat(section.level.saturating_sub(1));
        let origin = if section.discovered { " (discovered)" } else { "" };
        println!(
            "{indent}{}: {} file(s){origin}",
            section.heading_path,
            section.files.len()
        );
        for file in &section.files {
            println!("{indent}  - {file}");
        }
        for pattern in &section.unmatched_patterns {
            println!("{indent}  ! no match: {pattern}");
        }
    }
}
