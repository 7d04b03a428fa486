//! Read-once content cache shared by discovery and generation.
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Bytes inspected when sniffing for binary content.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

pub struct SourceCache {
    root: PathBuf,
    max_file_bytes: u64,
    entries: HashMap<PathBuf, Option<Rc<str>>>,
    reads: usize,
}

impl SourceCache {
    pub fn new(root: &Path, max_file_bytes: u64) -> Self {
        Self {
            root: root.to_path_buf(),
            max_file_bytes,
            entries: HashMap::new(),
            reads: 0,
        }
    }

    /// Content of a root-relative file, or `None` when it is missing, binary,
    /// or larger than the configured limit. The file is read at most once.
    pub fn get(&mut self, rel: &Path) -> Option<Rc<str>> {
        if let Some(entry) = self.entries.get(rel) {
            return entry.clone();
        }
        self.reads += 1;
        let loaded = self.load(rel).map(Rc::from);
        self.entries.insert(rel.to_path_buf(), loaded.clone());
        loaded
    }

    /// Number of filesystem reads performed so far.
    pub fn reads(&self) -> usize {
        self.reads
    }

    fn load(&self, rel: &Path) -> Option<String> {
        let path = self.root.join(rel);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!(path = %rel.display(), error = %err, "source unreadable");
                return None;
            }
        };
        if metadata.len() > self.max_file_bytes {
            tracing::debug!(
                path = %rel.display(),
                bytes = metadata.len(),
                limit = self.max_file_bytes,
                "source skipped: too large"
            );
            return None;
        }
        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        if let Err(err) = fs::File::open(&path).and_then(|mut file| file.read_to_end(&mut bytes)) {
            tracing::warn!(path = %rel.display(), error = %err, "source unreadable");
            return None;
        }
        let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
        if sniff.contains(&0) {
            tracing::debug!(path = %rel.display(), "source skipped: binary");
            return None;
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}
