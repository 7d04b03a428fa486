//! Workflow eval step: discovery accuracy against labelled ground truth.
use super::context::RunContext;
use crate::cli::EvalArgs;
use crate::discovery::{evaluate, load_ground_truth, AccuracyReport};
use crate::sources::ResolvedSections;
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;

pub fn run_eval(args: &EvalArgs) -> Result<()> {
    if let Some(min_f1) = args.min_f1 {
        if !(0.0..=1.0).contains(&min_f1) {
            return Err(anyhow!("--min-f1 must be within 0..=1 (got {min_f1})"));
        }
    }
    let truth = load_ground_truth(&args.ground_truth)?;
    let mut ctx = RunContext::load(&args.common)?;

    // Ground truth keys are headings or heading paths; labelled sections are
    // discovered whether or not the template declares their sources.
    let mut labelled = Vec::new();
    for key in truth.sections.keys() {
        match ctx.tree.find(key) {
            Some(id) => labelled.push((key.clone(), id)),
            None => tracing::warn!(section = %key, "ground truth names a section missing from the template"),
        }
    }
    let targets: Vec<_> = labelled.iter().map(|(_, id)| *id).collect();
    let mut resolved = ResolvedSections::new(&ctx.tree);
    let reports = ctx.discover(&targets, &mut resolved);

    let mut discovered: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, id) in &labelled {
        let paths = reports
            .iter()
            .find(|(found, _)| found == id)
            .map(|(_, report)| report.selected.iter().map(|c| c.path.clone()).collect())
            .unwrap_or_default();
        discovered.insert(key.clone(), paths);
    }
    let report = evaluate(&truth, &discovered);

    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize accuracy report")?;
        println!("{text}");
    } else {
        print_report(&report);
    }

    if let Some(min_f1) = args.min_f1 {
        if report.f1 < min_f1 {
            return Err(anyhow!(
                "discovery F1 {:.3} is below --min-f1 {min_f1:.3}",
                report.f1
            ));
        }
    }
    Ok(())
}

fn print_report(report: &AccuracyReport) {
    for section in &report.sections {
        println!(
            "{}: precision {:.2} recall {:.2} f1 {:.2} ({} of {} expected found)",
            section.heading,
            section.precision,
            section.recall,
            section.f1,
            section.true_positives,
            section.expected
        );
        for path in &section.missing {
            println!("  - missing {path}");
        }
        for path in &section.unexpected {
            println!("  + unexpected {path}");
        }
    }
    println!(
        "overall: precision {:.2} recall {:.2} f1 {:.2}",
        report.precision, report.recall, report.f1
    );
}
