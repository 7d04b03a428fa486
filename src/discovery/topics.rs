//! Topic keywords and the path fragments that usually hold their material.

/// `(keyword, path fragments)`; keywords match a query term exactly, or as a
/// prefix when the keyword has four or more characters (`install` matches
/// `installation`).
const TOPIC_HINTS: &[(&str, &[&str])] = &[
    (
        "install",
        &[
            "install", "setup", "readme", "requirements", "pyproject", "cargo.toml",
            "package.json", "makefile", "dockerfile", "config",
        ],
    ),
    ("setup", &["setup", "install", "readme", "config", "makefile"]),
    ("config", &["config", "settings", "conf", ".env", "options", ".toml", ".yaml", ".yml"]),
    ("setting", &["settings", "config", "options"]),
    ("cli", &["cli", "cmd", "command", "main", "bin/", "args"]),
    ("command", &["cli", "cmd", "command", "main", "bin/"]),
    ("usage", &["readme", "example", "cli", "main", "docs/", "tutorial"]),
    ("example", &["example", "demo", "sample", "tutorial"]),
    ("quickstart", &["readme", "example", "docs/", "getting"]),
    ("api", &["api", "routes", "handler", "endpoint", "server", "lib.", "client"]),
    ("endpoint", &["routes", "handler", "endpoint", "api", "server"]),
    ("architecture", &["src/", "core", "engine", "mod.", "lib.", "internal", "design"]),
    ("design", &["design", "architecture", "docs/", "core"]),
    ("overview", &["readme", "docs/", "index", "lib.", "__init__"]),
    ("introduction", &["readme", "docs/", "index"]),
    ("test", &["test", "spec", "fixture", "conftest"]),
    ("deploy", &["deploy", "docker", "k8s", "helm", ".github/workflows", "ci", "terraform"]),
    ("model", &["model", "schema", "entity", "types", "domain"]),
    ("data", &["model", "schema", "data", "db", "migration"]),
    ("database", &["db", "migration", "schema", "sql", "repository"]),
    ("auth", &["auth", "login", "token", "session", "permission", "security"]),
    ("security", &["security", "auth", "permission", "crypto"]),
    ("contributing", &["contributing", "code_of_conduct", "makefile", ".github", "development"]),
    ("development", &["contributing", "makefile", "justfile", "dev", ".github"]),
    ("license", &["license", "copying"]),
    ("changelog", &["changelog", "history", "release"]),
    ("error", &["error", "exception", "fault"]),
    ("logging", &["log", "tracing", "telemetry", "observability"]),
];

fn keyword_matches(keyword: &str, term: &str) -> bool {
    term == keyword || (keyword.len() >= 4 && term.starts_with(keyword))
}

/// Path fragments hinted by any of the query terms, deduplicated in table order.
pub fn hinted_fragments<S: AsRef<str>>(terms: &[S]) -> Vec<&'static str> {
    let mut fragments: Vec<&'static str> = Vec::new();
    for (keyword, hints) in TOPIC_HINTS {
        if !terms.iter().any(|term| keyword_matches(keyword, term.as_ref())) {
            continue;
        }
        for &hint in hints.iter() {
            if !fragments.contains(&hint) {
                fragments.push(hint);
            }
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installation_hints_config_paths() {
        let fragments = hinted_fragments(&["installation"]);
        assert!(fragments.contains(&"install"));
        assert!(fragments.contains(&"config"));
    }

    #[test]
    fn short_keywords_need_exact_terms() {
        assert!(hinted_fragments(&["client"]).iter().all(|hint| *hint != "cmd"));
        assert!(hinted_fragments(&["cli"]).contains(&"cmd"));
    }

    #[test]
    fn unknown_terms_hint_nothing() {
        assert!(hinted_fragments(&["zebra"]).is_empty());
    }
}
