//! LM call logging for run transparency.
//!
//! When enabled, every backend call appends one JSON line so users can see
//! what was asked, of which section or file, how long it took, and how it
//! ended:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"seq":1,"kind":"score","subject":"src/cli.rs",...}
//! {"schema_version":1,"ts":1707900004200,"seq":2,"kind":"generate","subject":"Guide",...}
//! ```
use crate::util::preview;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Current schema version for LM log entries.
pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmCallKind {
    /// Section content generation.
    Generate,
    /// Stage-3 relevance scoring of one file.
    Score,
}

impl std::fmt::Display for LmCallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::Score => write!(f, "score"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    pub schema_version: u32,
    /// Unix timestamp in milliseconds when the entry was written.
    pub ts: u64,
    /// Call sequence number within this run (1-indexed).
    pub seq: u32,
    pub kind: LmCallKind,
    /// Section heading path or file path the call was about.
    pub subject: String,
    pub duration_ms: u64,
    pub outcome: LmOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Builder for constructing LM log entries with timing.
pub struct LmLogBuilder {
    start: Instant,
    seq: u32,
    kind: LmCallKind,
    subject: String,
    prompt_preview: Option<String>,
}

impl LmLogBuilder {
    pub fn new(seq: u32, kind: LmCallKind, subject: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            seq,
            kind,
            subject: subject.into(),
            prompt_preview: None,
        }
    }

    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        self.prompt_preview = Some(preview(prompt, PROMPT_PREVIEW_BYTES));
        self
    }

    pub fn success(self) -> LmLogEntry {
        self.build(LmOutcome::Success, None)
    }

    pub fn failed(self, error: impl Into<String>) -> LmLogEntry {
        self.build(LmOutcome::Failed, Some(error.into()))
    }

    fn build(self, outcome: LmOutcome, error: Option<String>) -> LmLogEntry {
        LmLogEntry {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            seq: self.seq,
            kind: self.kind,
            subject: self.subject,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Append-only JSONL sink for one run.
#[derive(Debug)]
pub struct LmLog {
    path: PathBuf,
    seq: Cell<u32>,
}

impl LmLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            seq: Cell::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start an entry with the next sequence number.
    pub fn begin(&self, kind: LmCallKind, subject: &str) -> LmLogBuilder {
        let seq = self.seq.get() + 1;
        self.seq.set(seq);
        LmLogBuilder::new(seq, kind, subject)
    }

    /// Append an entry; a failed write is logged and otherwise ignored.
    pub fn record(&self, entry: &LmLogEntry) {
        if let Err(err) = append_lm_log(&self.path, entry) {
            tracing::warn!(path = %self.path.display(), error = %err, "lm log write failed");
        }
    }
}

pub fn append_lm_log(path: &Path, entry: &LmLogEntry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("create lm log directory")?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open lm log for append: {}", path.display()))?;
    let line = serde_json::to_string(entry).context("serialize lm log entry")?;
    writeln!(file, "{}", line).context("write lm log entry")?;
    Ok(())
}

/// Load all entries, skipping corrupt lines.
pub fn load_lm_log(path: &Path) -> Result<Vec<LmLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("open lm log: {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} of lm log", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LmLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(line = line_num + 1, error = %e, "skip corrupt lm log entry");
            }
        }
    }
    Ok(entries)
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
