//! Typed failures for resolution, validation, discovery, and generation.
//!
//! Workflow plumbing uses `anyhow`; these types exist where callers branch on
//! the failure kind (retry vs. abort, fall back vs. halt).
use std::fmt;
use thiserror::Error;

/// Outcome of a single backend call that did not produce text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Worth retrying: non-zero exit, empty or unparsable output.
    #[error("transient backend failure: {0}")]
    Transient(String),
    /// Retrying cannot help: missing program, malformed command.
    #[error("permanent backend failure: {0}")]
    Permanent(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// A declared source pattern that could not contribute files.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("pattern {pattern:?} matched no files")]
    NoMatches { pattern: String },
    #[error("invalid source pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// One section that reached validation without any grounding source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcelessSection {
    pub heading: String,
    pub heading_path: String,
    pub unmatched_patterns: Vec<String>,
}

impl fmt::Display for SourcelessSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section {:?} has no sources", self.heading_path)?;
        if !self.unmatched_patterns.is_empty() {
            let patterns = self
                .unmatched_patterns
                .iter()
                .map(|pattern| format!("{pattern:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " (unmatched patterns: {patterns})")?;
        }
        Ok(())
    }
}

/// Pre-flight failure: at least one section has zero sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub sections: Vec<SourcelessSection>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = self
            .sections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "source validation failed: {details}")
    }
}

/// Stage-3 scoring failed for one candidate; discovery keeps going.
#[derive(Debug, Clone, Error)]
#[error("relevance scoring failed for {path}: {source}")]
pub struct DiscoveryBackendError {
    pub path: String,
    #[source]
    pub source: BackendError,
}

/// A tree node could not be generated after retries.
#[derive(Debug, Clone, Error)]
#[error("generation failed for section {heading_path:?} after {attempts} attempt(s): {source}")]
pub struct GenerationError {
    pub heading: String,
    pub heading_path: String,
    pub attempts: u32,
    #[source]
    pub source: BackendError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_every_section_and_pattern() {
        let err = ValidationError {
            sections: vec![SourcelessSection {
                heading: "Installation".to_string(),
                heading_path: "Installation".to_string(),
                unmatched_patterns: vec!["docs/install/*.md".to_string()],
            }],
        };
        let text = err.to_string();
        assert!(text.contains("\"Installation\""));
        assert!(text.contains("docs/install/*.md"));
    }

    #[test]
    fn generation_error_names_section() {
        let err = GenerationError {
            heading: "C".to_string(),
            heading_path: "A > C".to_string(),
            attempts: 3,
            source: BackendError::Transient("exit status 1".to_string()),
        };
        assert!(err.to_string().contains("\"A > C\""));
        assert!(err.to_string().contains("3 attempt"));
    }
}
