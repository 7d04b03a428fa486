//! Atomic output writes.
//!
//! Every artifact (document, partial document, sources map, annotated
//! template) is written to a temporary file next to its destination and then
//! renamed into place, so a crash never leaves a half-written file behind.
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub fn write_bytes_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    staged
        .write_all(bytes)
        .with_context(|| format!("write {}", dest.display()))?;
    staged
        .as_file()
        .sync_all()
        .with_context(|| format!("sync {}", dest.display()))?;
    staged
        .persist(dest)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

pub fn write_text_atomic(dest: &Path, text: &str) -> Result<()> {
    write_bytes_atomic(dest, text.as_bytes())
}

pub fn write_json_atomic<T: Serialize>(dest: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .with_context(|| format!("serialize {}", dest.display()))?;
    bytes.push(b'\n');
    write_bytes_atomic(dest, &bytes)
}

/// `FILE.partial` next to `FILE`, where incomplete documents go.
pub fn partial_path(out: &Path) -> PathBuf {
    let mut name = out.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}
