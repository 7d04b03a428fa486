//! Precision, recall, and F1 of discovery against labelled ground truth.
//!
//! Used by `dforge eval` as a regression gate for the pipeline; never part
//! of a generation run.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// `{"sections": {"<heading or heading path>": ["path", ...]}}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GroundTruth {
    pub sections: BTreeMap<String, Vec<String>>,
}

pub fn load_ground_truth(path: &Path) -> Result<GroundTruth> {
    let bytes =
        fs::read(path).with_context(|| format!("read ground truth {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parse ground truth JSON {}", path.display()))
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionAccuracy {
    pub heading: String,
    pub expected: usize,
    pub found: usize,
    pub true_positives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    pub sections: Vec<SectionAccuracy>,
    /// Micro-averaged over every labelled section.
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn ratio(numerator: usize, denominator: usize, empty: f64) -> f64 {
    if denominator == 0 {
        empty
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall <= 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn normalize(path: &str) -> String {
    path.trim().trim_start_matches("./").to_string()
}

/// Compare discovered files per section with the ground truth.
///
/// `discovered` is keyed the same way as the ground truth. Labelled sections
/// with nothing discovered count as all-missing. An empty selection against
/// an empty label scores 1.
pub fn evaluate(truth: &GroundTruth, discovered: &BTreeMap<String, Vec<String>>) -> AccuracyReport {
    let mut sections = Vec::new();
    let (mut total_tp, mut total_expected, mut total_found) = (0, 0, 0);

    for (heading, expected_paths) in &truth.sections {
        let expected: BTreeSet<String> = expected_paths.iter().map(|p| normalize(p)).collect();
        let found: BTreeSet<String> = discovered
            .get(heading)
            .map(|paths| paths.iter().map(|p| normalize(p)).collect())
            .unwrap_or_default();
        let true_positives = expected.intersection(&found).count();
        let both_empty = expected.is_empty() && found.is_empty();
        let precision = ratio(true_positives, found.len(), if both_empty { 1.0 } else { 0.0 });
        let recall = ratio(true_positives, expected.len(), 1.0);
        sections.push(SectionAccuracy {
            heading: heading.clone(),
            expected: expected.len(),
            found: found.len(),
            true_positives,
            precision,
            recall,
            f1: if both_empty { 1.0 } else { f1(precision, recall) },
            missing: expected.difference(&found).cloned().collect(),
            unexpected: found.difference(&expected).cloned().collect(),
        });
        total_tp += true_positives;
        total_expected += expected.len();
        total_found += found.len();
    }

    let precision = ratio(total_tp, total_found, 0.0);
    let recall = ratio(total_tp, total_expected, 0.0);
    AccuracyReport {
        sections,
        precision,
        recall,
        f1: f1(precision, recall),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truth(entries: &[(&str, &[&str])]) -> GroundTruth {
        GroundTruth {
            sections: entries
                .iter()
                .map(|(heading, paths)| {
                    (
                        heading.to_string(),
                        paths.iter().map(|p| p.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    fn found(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        truth(entries).sections
    }

    #[test]
    fn per_section_and_micro_scores() {
        let truth = truth(&[
            ("Usage", &["cli.py", "README.md"]),
            ("Models", &["models.py"]),
        ]);
        let discovered = found(&[
            ("Usage", &["cli.py", "setup.py"]),
            ("Models", &["./models.py"]),
        ]);
        let report = evaluate(&truth, &discovered);

        let usage = report
            .sections
            .iter()
            .find(|section| section.heading == "Usage")
            .expect("usage");
        assert_eq!(usage.true_positives, 1);
        assert!((usage.precision - 0.5).abs() < 1e-9);
        assert!((usage.recall - 0.5).abs() < 1e-9);
        assert_eq!(usage.missing, vec!["README.md"]);
        assert_eq!(usage.unexpected, vec!["setup.py"]);

        // 2 true positives out of 3 found and 3 expected.
        assert!((report.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.recall - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.f1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn undiscovered_section_counts_as_missing() {
        let truth = truth(&[("Install", &["INSTALL.md"])]);
        let report = evaluate(&truth, &BTreeMap::new());
        assert_eq!(report.sections[0].recall, 0.0);
        assert_eq!(report.sections[0].f1, 0.0);
        assert_eq!(report.f1, 0.0);
    }

    #[test]
    fn parses_ground_truth_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("truth.json");
        fs::write(&path, r#"{"sections": {"Usage": ["cli.py"]}}"#).expect("write");
        let truth = load_ground_truth(&path).expect("load");
        assert_eq!(truth.sections["Usage"], vec!["cli.py"]);
    }
}
