mod common;

use common::{read, stderr, stdout, Repo};

const GUIDE_TEMPLATE: &str = r#"{
    "title": "Project Guide",
    "sections": [
        {"title": "Overview", "sources": ["README.md"]},
        {"title": "Guide", "prompt": "Explain how the project is used.", "sources": ["docs/guide.md"], "sections": [
            {"title": "Setup", "sources": ["setup.py"]},
            {"title": "Config", "sources": ["config/*.toml"]}
        ]}
    ]
}"#;

const FLAT_TEMPLATE: &str = r#"{"sections": [
    {"title": "A", "sources": ["a.md"]},
    {"title": "B", "sources": ["b.md"]},
    {"title": "C", "sources": ["c.md"]},
    {"title": "D", "sources": ["d.md"]}
]}"#;

fn guide_repo() -> Repo {
    let repo = Repo::new();
    repo.write("README.md", "# Project\n\nA small tool.\n");
    repo.write("docs/guide.md", "Start with setup, then configure.\n");
    repo.write("setup.py", "from setuptools import setup\nsetup(name=\"tool\")\n");
    repo.write("config/default.toml", "verbose = false\n");
    repo
}

fn flat_repo() -> Repo {
    let repo = Repo::new();
    for name in ["a", "b", "c", "d"] {
        repo.write(&format!("{name}.md"), &format!("Notes for {name}.\n"));
    }
    // No backoff and no retries keep failure tests fast and the call log exact.
    repo.write(
        "dforge.json",
        r#"{"schema_version": 1, "lm": {"max_retries": 0, "initial_backoff_ms": 0, "max_backoff_ms": 0}}"#,
    );
    repo
}

fn path_str(path: &std::path::Path) -> String {
    path.display().to_string()
}

#[test]
fn generate_writes_document_in_preorder() {
    let repo = guide_repo();
    let template = repo.template(GUIDE_TEMPLATE);
    let out = repo.outside("GUIDE.md");
    let map = repo.outside("sources.json");
    let log = repo.outside("lm.jsonl");

    let output = repo.dforge(&[
        "generate",
        "--template",
        &path_str(&template),
        "--out",
        &path_str(&out),
        "--sources-map",
        &path_str(&map),
        "--lm-log",
        &path_str(&log),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    assert_eq!(
        repo.calls(),
        vec![
            "generate Overview",
            "generate Guide",
            "generate Setup",
            "generate Config"
        ]
    );

    let document = read(&out);
    assert!(document.starts_with("# Project Guide\n"));
    let positions: Vec<usize> = ["## Overview", "## Guide", "### Setup", "### Config"]
        .iter()
        .map(|heading| document.find(heading).expect("heading present"))
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(document.contains("Generated text about Setup."));

    let sources: serde_json::Value = serde_json::from_str(&read(&map)).expect("sources map JSON");
    assert_eq!(sources["Setup"]["sources_used"][0], "setup.py");
    assert_eq!(sources["Config"]["sources_used"][0], "config/default.toml");
    assert_eq!(sources["Config"]["reasoning"]["config/*.toml"], "declared in template");

    let entries: Vec<serde_json::Value> = read(&log)
        .lines()
        .map(|line| serde_json::from_str(line).expect("log line JSON"))
        .collect();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|entry| entry["kind"] == "generate"));
    assert!(entries.iter().all(|entry| entry["outcome"] == "success"));
}

#[test]
fn unmatched_sources_fail_before_any_generation() {
    let repo = Repo::python_cli();
    let template = repo.template(
        r#"{"sections": [
            {"title": "Overview", "sources": ["README.md"]},
            {"title": "Installation", "sources": ["docs/install/*.md"]},
            {"title": "Usage", "sources": ["cli.py"]}
        ]}"#,
    );
    let out = repo.outside("GUIDE.md");

    let output = repo.dforge(&[
        "generate",
        "--template",
        &path_str(&template),
        "--out",
        &path_str(&out),
    ]);
    assert!(!output.status.success());
    let message = stderr(&output);
    assert!(message.contains("Installation"), "stderr: {message}");
    assert!(message.contains("docs/install/*.md"), "stderr: {message}");
    assert!(repo.calls().is_empty());
    assert!(!out.exists());
}

#[test]
fn failed_declared_sources_skip_discovery_scoring() {
    let repo = Repo::python_cli();
    let template = repo.template(
        r#"{"sections": [
            {"title": "Overview", "prompt": "What the project is for."},
            {"title": "Installation", "sources": ["docs/install/*.md"]}
        ]}"#,
    );

    let output = repo.dforge(&["generate", "--template", &path_str(&template)]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Installation"));
    assert!(repo.calls().is_empty(), "calls: {:?}", repo.calls());
    assert!(stdout(&output).is_empty());
}

#[test]
fn node_failure_keeps_partial_document() {
    let repo = flat_repo();
    let template = repo.template(FLAT_TEMPLATE);
    let out = repo.outside("GUIDE.md");

    let output = repo.dforge_with_env(
        &[
            "generate",
            "--template",
            &path_str(&template),
            "--out",
            &path_str(&out),
        ],
        &[("MOCK_FAIL_SECTION", "C")],
    );
    assert!(!output.status.success());
    let message = stderr(&output);
    assert!(message.contains("\"C\""), "stderr: {message}");

    assert_eq!(repo.calls(), vec!["generate A", "generate B", "generate C"]);
    assert!(!out.exists());
    let partial = read(&repo.outside("GUIDE.md.partial"));
    assert!(partial.contains("# A\n\nGenerated text about A."));
    assert!(partial.contains("# B\n\nGenerated text about B."));
    assert!(!partial.contains("# C"));
    assert!(!partial.contains("# D"));
}

#[test]
fn max_sections_interrupts_between_nodes() {
    let repo = flat_repo();
    let template = repo.template(FLAT_TEMPLATE);

    let output = repo.dforge(&[
        "generate",
        "--template",
        &path_str(&template),
        "--max-sections",
        "2",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("\"C\""));
    assert_eq!(repo.calls(), vec!["generate A", "generate B"]);
    let printed = stdout(&output);
    assert!(printed.contains("# B"));
    assert!(!printed.contains("# C"));
}

#[test]
fn check_discovers_without_generating() {
    let repo = Repo::python_cli();
    let template = repo.template(
        r#"{"sections": [
            {"title": "CLI usage", "prompt": "How to run the tool from the command line."}
        ]}"#,
    );

    let output = repo.dforge(&["check", "--template", &path_str(&template), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("check JSON");
    assert_eq!(summary["validation"]["passed"], true);
    let section = &summary["sections"][0];
    assert_eq!(section["heading_path"], "CLI usage");
    assert_eq!(section["discovered"], true);
    assert_eq!(section["files"], serde_json::json!(["cli.py", "README.md"]));
    assert_eq!(summary["discovery"][0]["stage1"], 3);

    let calls = repo.calls();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|call| call.starts_with("score ")));
}

#[test]
fn check_fails_on_sourceless_sections() {
    let repo = Repo::python_cli();
    let template = repo.template(r#"{"sections": [{"title": "Deployment", "sources": ["deploy/*.yaml"]}]}"#);
    let output = repo.dforge(&["check", "--template", &path_str(&template)]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("no match: deploy/*.yaml"));
    assert!(stderr(&output).contains("Deployment"));
}

#[test]
fn discover_writes_annotated_template() {
    let repo = Repo::python_cli();
    let template = repo.template(
        r#"{"title": "Docs", "sections": [
            {"title": "Overview", "sources": ["README.md"]},
            {"title": "CLI usage", "prompt": "How to run the tool from the command line."}
        ]}"#,
    );
    let written = repo.outside("annotated.json");

    let output = repo.dforge(&[
        "discover",
        "--template",
        &path_str(&template),
        "--write",
        &path_str(&written),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("cli.py"));

    let annotated: serde_json::Value = serde_json::from_str(&read(&written)).expect("template JSON");
    assert_eq!(annotated["sections"][0]["sources"][0], "README.md");
    let discovered = &annotated["sections"][1]["sources"];
    assert_eq!(discovered[0]["path"], "cli.py");
    assert_eq!(discovered[0]["score"], 9.0);
    assert_eq!(discovered[0]["method"], "llm");
    assert_eq!(discovered[0]["reasoning"], "mock judgment for cli.py");
    assert_eq!(discovered[1]["path"], "README.md");
    assert_eq!(discovered.as_array().map(Vec::len), Some(2));
}

#[test]
fn eval_gates_on_f1() {
    let repo = Repo::python_cli();
    let template = repo.template(
        r#"{"sections": [
            {"title": "CLI usage", "prompt": "How to run the tool from the command line."}
        ]}"#,
    );
    let truth = repo.outside("truth.json");
    std::fs::write(&truth, r#"{"sections": {"CLI usage": ["cli.py"]}}"#).expect("write truth");

    let passing = repo.dforge(&[
        "eval",
        "--template",
        &path_str(&template),
        "--ground-truth",
        &path_str(&truth),
        "--min-f1",
        "0.5",
        "--json",
    ]);
    assert!(passing.status.success(), "stderr: {}", stderr(&passing));
    let report: serde_json::Value = serde_json::from_str(&stdout(&passing)).expect("eval JSON");
    assert_eq!(report["recall"], 1.0);
    assert_eq!(report["precision"], 0.5);

    let failing = repo.dforge(&[
        "eval",
        "--template",
        &path_str(&template),
        "--ground-truth",
        &path_str(&truth),
        "--min-f1",
        "0.9",
    ]);
    assert!(!failing.status.success());
    assert!(stderr(&failing).contains("below --min-f1"));
}
