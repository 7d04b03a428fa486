//! Pre-flight source validation.
//!
//! Runs over the whole resolved tree before the first generation call. A
//! section with no files after resolution and discovery would be written
//! from nothing, so the run stops here instead.
use crate::error::{SourcelessSection, ValidationError};
use crate::sources::ResolvedSections;
use crate::template::{SectionId, SectionTree};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub sections_checked: usize,
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<SourcelessSection>,
}

impl ValidationResult {
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.passed {
            Ok(())
        } else {
            Err(ValidationError {
                sections: self.failures,
            })
        }
    }
}

#[derive(Serialize)]
struct FailureNote<'a> {
    heading: &'a str,
    heading_path: &'a str,
    unmatched_patterns: &'a [String],
}

fn serialize_failures<S: serde::Serializer>(
    failures: &[SourcelessSection],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(failures.iter().map(|failure| FailureNote {
        heading: &failure.heading,
        heading_path: &failure.heading_path,
        unmatched_patterns: &failure.unmatched_patterns,
    }))
}

/// Check every section, nested ones included, in document order.
pub fn validate(tree: &SectionTree, resolved: &ResolvedSections) -> ValidationResult {
    validate_where(tree, resolved, |_| true)
}

/// Check only the sections `include` selects, in document order.
///
/// Sections whose sources are already final (declared, or discovery off)
/// can be checked before discovery spends any backend call.
pub fn validate_where(
    tree: &SectionTree,
    resolved: &ResolvedSections,
    include: impl Fn(SectionId) -> bool,
) -> ValidationResult {
    let order: Vec<SectionId> = tree.preorder().into_iter().filter(|id| include(*id)).collect();
    let mut failures = Vec::new();
    for id in &order {
        let sources = resolved.get(*id);
        if !sources.files.is_empty() {
            continue;
        }
        let failure = SourcelessSection {
            heading: tree.get(*id).heading.clone(),
            heading_path: tree.heading_path(*id),
            unmatched_patterns: sources.unmatched.clone(),
        };
        tracing::warn!(section = %failure.heading_path, "section has no sources");
        failures.push(failure);
    }
    ValidationResult {
        passed: failures.is_empty(),
        sections_checked: order.len(),
        failures,
    }
}
