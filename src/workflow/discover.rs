//! Workflow discover step.
//!
//! Shows what discovery selects for each section and, with `--write`, saves
//! a template copy whose discovered sources carry score, reasoning and
//! method so later runs (and reviewers) can reuse them.
use super::context::RunContext;
use crate::cli::DiscoverArgs;
use crate::discovery::DiscoveryReport;
use crate::output::write_json_atomic;
use crate::sources::ResolvedSections;
use crate::template::to_raw;
use anyhow::{anyhow, Context, Result};

pub fn run_discover(args: &DiscoverArgs) -> Result<()> {
    let mut ctx = RunContext::load(&args.common)?;
    // A section named explicitly is discovered even if it declares sources.
    let targets = match &args.section {
        Some(heading) => {
            let id = ctx.tree.find(heading).ok_or_else(|| {
                anyhow!(
                    "no section {heading:?} in {}",
                    ctx.template_path.display()
                )
            })?;
            vec![id]
        }
        None => ctx
            .tree
            .preorder()
            .into_iter()
            .filter(|id| ctx.tree.get(*id).wants_discovery())
            .collect(),
    };
    if targets.is_empty() {
        eprintln!("every section declares its sources; nothing to discover (use --section to force one)");
    }

    let mut resolved = ResolvedSections::new(&ctx.tree);
    let reports: Vec<DiscoveryReport> = ctx
        .discover(&targets, &mut resolved)
        .into_iter()
        .map(|(_, report)| report)
        .collect();

    if args.json {
        let text = serde_json::to_string_pretty(&reports).context("serialize discovery reports")?;
        println!("{text}");
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    if let Some(path) = &args.write {
        write_json_atomic(path, &to_raw(&ctx.tree))?;
        if ctx.verbose {
            eprintln!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn print_report(report: &DiscoveryReport) {
    println!(
        "{} (inventory {}, stage1 {}, stage2 {}, selected {})",
        report.heading_path, report.inventory, report.stage1, report.stage2, report.stage3
    );
    if report.selected.is_empty() {
        println!("  no relevant files found");
    }
    for candidate in &report.selected {
        println!(
            "  {:>4.1}  {}  [{}] {}",
            candidate.score, candidate.path, candidate.method, candidate.reasoning
        );
    }
    for fallback in &report.fallbacks {
        println!("  ! scoring fell back for {}: {}", fallback.path, fallback.source);
    }
}
