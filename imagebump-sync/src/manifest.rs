//! Manifest parsing and serialization.
//!
//! A manifest file holds one or more YAML documents. Serialization is
//! deterministic and never folds long scalars, and it is round-trip stable:
//! parsing [`Manifest::to_yaml`] output and serializing again yields the same
//! text.

use serde::Deserialize;
use serde_yaml::Value;

use imagebump_core::ImageTarget;

use crate::mutator::{self, ImageChange};

const DOCUMENT_SEPARATOR: &str = "---\n";

/// Parsed form of one manifest file.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub documents: Vec<Value>,
}

impl Manifest {
    /// Parse every `---`-separated document in `text`.
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(text) {
            documents.push(Value::deserialize(document)?);
        }
        Ok(Self { documents })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let rendered = self
            .documents
            .iter()
            .map(serde_yaml::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join(DOCUMENT_SEPARATOR))
    }

    /// Rewrite matching images in every document.
    pub fn retag(&self, target: &ImageTarget) -> (Manifest, Vec<ImageChange>) {
        let mut changes = Vec::new();
        let documents = self
            .documents
            .iter()
            .map(|document| {
                let mutation = mutator::retag(document, target);
                changes.extend(mutation.changes);
                mutation.document
            })
            .collect();
        (Manifest { documents }, changes)
    }

    /// Every image reference in the file, in document order.
    pub fn image_references(&self) -> Vec<String> {
        self.documents
            .iter()
            .flat_map(mutator::image_references)
            .collect()
    }
}

/// Outcome of [`retag_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retagged {
    /// New file content, present only when the file must be rewritten.
    pub content: Option<String>,
    pub changes: Vec<ImageChange>,
}

impl Retagged {
    pub fn is_dirty(&self) -> bool {
        self.content.is_some()
    }
}

/// Parse `original`, retag it, and decide whether the file needs rewriting.
///
/// The file is dirty only when at least one image was rewritten and the
/// serialized result differs byte-for-byte from `original`.
pub fn retag_text(original: &str, target: &ImageTarget) -> Result<Retagged, serde_yaml::Error> {
    let manifest = Manifest::parse(original)?;
    let (retagged, changes) = manifest.retag(target);
    if changes.is_empty() {
        return Ok(Retagged {
            content: None,
            changes,
        });
    }

    let rendered = retagged.to_yaml()?;
    let content = if rendered == original {
        None
    } else {
        Some(rendered)
    };
    Ok(Retagged { content, changes })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use imagebump_core::UpdateRequest;

    use super::*;

    fn target(image: &str, version: &str) -> ImageTarget {
        UpdateRequest::new(image, version).target().expect("valid target")
    }

    #[test]
    fn rewrites_matching_image_in_place() {
        let retagged = retag_text(
            "kind: Pod\nspec:\n  image: registry/app:1.0.0\n",
            &target("registry/app", "1.1.0"),
        )
        .expect("retag");
        assert_eq!(
            retagged.content.as_deref(),
            Some("kind: Pod\nspec:\n  image: registry/app:1.1.0\n")
        );
    }

    #[test]
    fn no_match_is_not_dirty_even_when_formatting_differs() {
        // Non-canonical formatting must not trigger a rewrite on its own.
        let original = "kind:   Pod   # comment\nspec: {image: \"other/app:2.0.0\"}\n";
        let retagged = retag_text(original, &target("registry/app", "1.1.0")).expect("retag");
        assert!(!retagged.is_dirty());
        assert!(retagged.changes.is_empty());
    }

    #[test]
    fn no_match_serializes_identically_to_original_tree() {
        let original = "a: 1\nlist:\n- image: other/app:2\n- x: y\n";
        let manifest = Manifest::parse(original).expect("parse");
        let (retagged, changes) = manifest.retag(&target("registry/app", "2"));
        assert!(changes.is_empty());
        assert_eq!(
            retagged.to_yaml().expect("yaml"),
            manifest.to_yaml().expect("yaml")
        );
    }

    #[test]
    fn serialization_is_round_trip_stable() {
        let original = "\
metadata:
  annotations:
    note: 'a long annotation value that goes well past eighty columns so that any folding emitter would wrap it'
spec:
  containers:
  - image: registry/app:1.0.0
    args: [\"--flag\", \"value with: colon\"]
";
        let first = retag_text(original, &target("registry/app", "1.1.0"))
            .expect("retag")
            .content
            .expect("dirty");
        let second = Manifest::parse(&first)
            .expect("reparse")
            .to_yaml()
            .expect("reserialize");
        assert_eq!(first, second);
        assert!(
            first.lines().any(|line| line.contains("folding emitter would wrap it")),
            "long scalar must stay on one line:\n{first}"
        );
    }

    #[test]
    fn multi_document_files_are_retagged_per_document() {
        let original = "\
kind: Deployment
image: registry/app:1.0.0
---
kind: Job
image: other/app:1.0.0
---
kind: CronJob
image: registry/app:0.9.0
";
        let retagged = retag_text(original, &target("registry/app", "1.1.0")).expect("retag");
        assert_eq!(retagged.changes.len(), 2);
        let content = retagged.content.expect("dirty");
        let reparsed = Manifest::parse(&content).expect("reparse");
        assert_eq!(reparsed.documents.len(), 3);
        assert_eq!(
            reparsed.image_references(),
            vec!["registry/app:1.1.0", "other/app:1.0.0", "registry/app:1.1.0"]
        );
    }

    #[test]
    fn already_current_version_is_not_dirty() {
        let retagged = retag_text("image: registry/app:1.1.0\n", &target("registry/app", "1.1.0"))
            .expect("retag");
        assert!(!retagged.is_dirty());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(retag_text("key: [unclosed\n", &target("registry/app", "1")).is_err());
    }
}
