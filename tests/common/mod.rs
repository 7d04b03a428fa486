//! Shared test infrastructure for integration tests.
//!
//! Each fixture is a throwaway repository plus a template kept outside it,
//! driven through the compiled `dforge` binary with `tests/mock-lm.sh` as the
//! LM command.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub struct Repo {
    dir: TempDir,
}

impl Repo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(dir.path().join("repo")).expect("create repo dir");
        Self { dir }
    }

    /// Repository with a CLI entry point, a README and an unrelated model.
    pub fn python_cli() -> Self {
        let repo = Self::new();
        repo.write("README.md", "# Project\n\nSee the usage notes below.\n");
        repo.write(
            "cli.py",
            "import argparse\n\n# cli entry point: parse command line flags\ndef main():\n    parser = argparse.ArgumentParser(prog=\"cli\")\n",
        );
        repo.write("models.py", "class User:\n    name: str\n    email: str\n");
        repo
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    /// Path outside the repository, for templates and outputs.
    pub fn outside(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write repo file");
    }

    pub fn template(&self, json: &str) -> PathBuf {
        let path = self.outside("outline.json");
        fs::write(&path, json).expect("write template");
        path
    }

    /// Run `dforge <args> --root <repo> --lm <mock>`.
    pub fn dforge(&self, args: &[&str]) -> Output {
        self.dforge_with_env(args, &[])
    }

    pub fn dforge_with_env(&self, args: &[&str], envs: &[(&str, &str)]) -> Output {
        let mock = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/mock-lm.sh");
        let lm = format!("sh {}", shell_words::quote(&mock.display().to_string()));
        Command::new(env!("CARGO_BIN_EXE_dforge"))
            .args(args)
            .arg("--root")
            .arg(self.root())
            .arg("--lm")
            .arg(lm)
            .env("MOCK_LM_CALLS", self.outside("calls.log"))
            .env("XDG_CONFIG_HOME", self.outside("xdg"))
            .env_remove("DFORGE_LM_COMMAND")
            .env_remove("MOCK_FAIL_SECTION")
            .env_remove("RUST_LOG")
            .envs(envs.iter().copied())
            .output()
            .expect("run dforge")
    }

    /// One `<role> <subject>` line per LM call made so far.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.outside("calls.log"))
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
}
