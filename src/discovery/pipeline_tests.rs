use super::*;
use crate::backend::testing::ScriptedScorer;
use crate::error::BackendError;
use crate::backend::{RelevanceJudgment, ScoringRequest};
use std::fs;

fn write(root: &std::path::Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(&path, content).expect("write file");
    PathBuf::from(rel)
}

fn cli_repo(root: &std::path::Path) -> Vec<PathBuf> {
    vec![
        write(root, "README.md", "# Project\n\nSee the usage notes below.\n"),
        write(
            root,
            "cli.py",
            "import argparse\n\n# cli entry point: parse command line flags\ndef main():\n    parser = argparse.ArgumentParser(prog=\"cli\")\n",
        ),
        write(root, "models.py", "class User:\n    name: str\n    email: str\n"),
    ]
}

fn cli_query() -> SectionQuery {
    SectionQuery {
        heading: "CLI usage".to_string(),
        heading_path: "CLI usage".to_string(),
        prompt: "How to run the tool from the command line.".to_string(),
    }
}

#[test]
fn cli_usage_section_selects_cli_and_readme() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inventory = cli_repo(dir.path());
    let mut cache = SourceCache::new(dir.path(), 64 * 1024);
    let scorer = ScriptedScorer::new(&[("cli.py", 9.0), ("README.md", 6.0), ("models.py", 2.0)]);
    let config = DiscoveryConfig::default();
    let pipeline = DiscoveryPipeline::new(&config, Some(&scorer));

    let report = pipeline.discover(&cli_query(), &inventory, &mut cache);

    assert_eq!(report.stage1, 3);
    assert_eq!(report.stage2, 3);
    let paths: Vec<&str> = report.selected.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["cli.py", "README.md"]);
    assert!(report.fallbacks.is_empty());
    // Stage 2 put cli.py first, so it was scored first.
    assert_eq!(scorer.calls()[0], "cli.py");
}

#[test]
fn stage_sizes_never_grow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut inventory = cli_repo(dir.path());
    for i in 0..30 {
        inventory.push(write(dir.path(), &format!("src/mod{i}.py"), "def helper(): pass\n"));
    }
    inventory.push(write(dir.path(), "logo.png", "PNG"));
    let mut cache = SourceCache::new(dir.path(), 64 * 1024);
    let scorer = ScriptedScorer::new(&[("cli.py", 9.0)]);
    let config = DiscoveryConfig::default();
    let pipeline = DiscoveryPipeline::new(&config, Some(&scorer));

    let report = pipeline.discover(&cli_query(), &inventory, &mut cache);

    assert!(report.stage1 <= report.inventory);
    assert!(report.stage2 <= report.stage1);
    assert!(report.stage3 <= report.stage2);
    assert_eq!(report.stage2, config.stage2_top_k);
    assert!(report.scored <= config.stage3_max);
}

#[test]
fn scoring_only_sees_bounded_excerpts() {
    struct ExcerptRecorder(std::cell::RefCell<Vec<usize>>);
    impl RelevanceScorer for ExcerptRecorder {
        fn score(&self, request: &ScoringRequest<'_>) -> Result<RelevanceJudgment, BackendError> {
            self.0.borrow_mut().push(request.excerpt.len());
            Ok(RelevanceJudgment {
                score: 8.0,
                reasoning: "long file".to_string(),
                key_material: String::new(),
            })
        }
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let inventory = vec![write(dir.path(), "cli.py", &"cli ".repeat(5_000))];
    let mut cache = SourceCache::new(dir.path(), 64 * 1024);
    let recorder = ExcerptRecorder(std::cell::RefCell::new(Vec::new()));
    let config = DiscoveryConfig {
        excerpt_chars: 100,
        ..DiscoveryConfig::default()
    };
    let report = DiscoveryPipeline::new(&config, Some(&recorder)).discover(
        &cli_query(),
        &inventory,
        &mut cache,
    );
    assert_eq!(report.selected.len(), 1);
    assert!(recorder.0.borrow().iter().all(|len| *len <= 100));
}

#[test]
fn backend_outage_degrades_to_stage2() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inventory = cli_repo(dir.path());
    let mut cache = SourceCache::new(dir.path(), 64 * 1024);
    let scorer = ScriptedScorer::new(&[]);
    let config = DiscoveryConfig::default();
    let report =
        DiscoveryPipeline::new(&config, Some(&scorer)).discover(&cli_query(), &inventory, &mut cache);

    assert_eq!(report.fallbacks.len(), 3);
    assert_eq!(report.selected[0].path, "cli.py");
    assert_eq!(report.selected[0].method, DiscoveryMethod::Semantic);
}

#[test]
fn oversized_candidates_are_never_selected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut inventory = cli_repo(dir.path());
    inventory.push(write(
        dir.path(),
        "docs/cli.md",
        &"Run the cli from the command line with flags.\n".repeat(100),
    ));
    let mut cache = SourceCache::new(dir.path(), 1024);
    let scorer = ScriptedScorer::new(&[
        ("docs/cli.md", 8.0),
        ("cli.py", 9.0),
        ("README.md", 6.0),
        ("models.py", 2.0),
    ]);
    let config = DiscoveryConfig::default();
    let pipeline = DiscoveryPipeline::new(&config, Some(&scorer));

    let report = pipeline.discover(&cli_query(), &inventory, &mut cache);

    assert!(report.selected.iter().all(|c| c.path != "docs/cli.md"));
    assert!(!scorer.calls().contains(&"docs/cli.md".to_string()));
    assert_eq!(report.selected[0].path, "cli.py");
}

#[test]
fn files_are_read_once_across_stages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inventory = cli_repo(dir.path());
    let mut cache = SourceCache::new(dir.path(), 64 * 1024);
    let scorer = ScriptedScorer::new(&[("cli.py", 9.0)]);
    let config = DiscoveryConfig::default();
    let pipeline = DiscoveryPipeline::new(&config, Some(&scorer));
    pipeline.discover(&cli_query(), &inventory, &mut cache);
    pipeline.discover(&cli_query(), &inventory, &mut cache);
    assert_eq!(cache.reads(), 3);
}

#[test]
fn report_serializes_fallbacks_as_notes() {
    let report = DiscoveryReport {
        heading_path: "Usage".to_string(),
        fallbacks: vec![DiscoveryBackendError {
            path: "cli.py".to_string(),
            source: BackendError::Transient("timeout".to_string()),
        }],
        ..DiscoveryReport::default()
    };
    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["fallbacks"][0]["path"], "cli.py");
    assert!(json["fallbacks"][0]["error"]
        .as_str()
        .is_some_and(|error| error.contains("timeout")));
}

#[test]
fn discovered_refs_carry_score_and_reasoning() {
    let candidate = Candidate {
        path: "cli.py".to_string(),
        score: 9.0,
        reasoning: "defines the entry point".to_string(),
        method: DiscoveryMethod::Llm,
    };
    let source = candidate.to_source_ref();
    assert!(!source.is_declared());
    assert_eq!(source.score(), Some(9.0));
    assert_eq!(source.reasoning(), Some("defines the entry point"));
}
