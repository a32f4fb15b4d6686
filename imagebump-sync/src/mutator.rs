//! Image tag rewriting over parsed manifest trees.
//!
//! [`retag`] is pure: it builds a new tree and reports every `image` value it
//! rewrote. Only values under a key literally named `image` whose base name
//! equals the target image are touched; every other node is copied as is,
//! mapping order included.

use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};

use imagebump_core::ImageTarget;

/// Mapping key whose string value holds an image reference.
pub const IMAGE_KEY: &str = "image";

/// One rewritten `image` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageChange {
    pub from: String,
    pub to: String,
}

/// Result of [`retag`]: the rewritten tree and what changed in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub document: Value,
    pub changes: Vec<ImageChange>,
}

impl Mutation {
    /// True when no `image` value was rewritten.
    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Rewrite every matching `image` value in `document` to `target`'s reference.
pub fn retag(document: &Value, target: &ImageTarget) -> Mutation {
    let mut changes = Vec::new();
    let document = retag_node(document, target, &mut changes);
    Mutation { document, changes }
}

fn retag_node(node: &Value, target: &ImageTarget, changes: &mut Vec<ImageChange>) -> Value {
    match node {
        Value::Sequence(items) => Value::Sequence(
            items
                .iter()
                .map(|item| retag_node(item, target, changes))
                .collect(),
        ),
        Value::Mapping(entries) => {
            let mut rewritten = Mapping::with_capacity(entries.len());
            for (key, value) in entries {
                let value = match (key, value) {
                    (Value::String(key), Value::String(reference)) if key == IMAGE_KEY => {
                        retag_reference(reference, target, changes)
                    }
                    _ => retag_node(value, target, changes),
                };
                rewritten.insert(key.clone(), value);
            }
            Value::Mapping(rewritten)
        }
        Value::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: retag_node(&tagged.value, target, changes),
        })),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => node.clone(),
    }
}

fn retag_reference(reference: &str, target: &ImageTarget, changes: &mut Vec<ImageChange>) -> Value {
    if !target.matches(reference) {
        return Value::String(reference.to_string());
    }
    let updated = target.reference();
    if updated != reference {
        changes.push(ImageChange {
            from: reference.to_string(),
            to: updated.clone(),
        });
    }
    Value::String(updated)
}

/// Every string value stored under an `image` key, in document order.
pub fn image_references(document: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_references(document, &mut found);
    found
}

fn collect_references(node: &Value, found: &mut Vec<String>) {
    match node {
        Value::Sequence(items) => items.iter().for_each(|item| collect_references(item, found)),
        Value::Mapping(entries) => {
            for (key, value) in entries {
                match (key, value) {
                    (Value::String(key), Value::String(reference)) if key == IMAGE_KEY => {
                        found.push(reference.clone());
                    }
                    _ => collect_references(value, found),
                }
            }
        }
        Value::Tagged(tagged) => collect_references(&tagged.value, found),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use imagebump_core::UpdateRequest;
    use rstest::rstest;

    use super::*;

    fn target(image: &str, version: &str) -> ImageTarget {
        UpdateRequest::new(image, version).target().expect("valid target")
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).expect("parse")
    }

    const DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
spec:
  template:
    spec:
      containers:
      - name: app
        image: registry/app:1.0.0
      - name: sidecar
        image: other/proxy:2.3
      initContainers:
      - name: migrate
        image: registry/app:1.0.0
";

    #[test]
    fn rewrites_every_matching_image_in_nested_sequences() {
        let mutation = retag(&yaml(DEPLOYMENT), &target("registry/app", "1.1.0"));
        assert_eq!(mutation.changes.len(), 2);
        assert_eq!(
            image_references(&mutation.document),
            vec!["registry/app:1.1.0", "other/proxy:2.3", "registry/app:1.1.0"]
        );
    }

    #[rstest]
    #[case("other/app")]
    #[case("registry/ap")]
    #[case("registry/app-worker")]
    #[case("Registry/App")]
    #[case("app")]
    fn non_matching_images_leave_document_untouched(#[case] image: &str) {
        let original = yaml(DEPLOYMENT);
        let mutation = retag(&original, &target(image, "9.9.9"));
        assert!(mutation.is_unchanged());
        assert_eq!(mutation.document, original);
    }

    #[test]
    fn same_version_is_not_recorded_as_change() {
        let mutation = retag(&yaml("image: registry/app:1.0.0\n"), &target("registry/app", "1.0.0"));
        assert!(mutation.is_unchanged());
    }

    #[test]
    fn untagged_reference_gains_version() {
        let mutation = retag(&yaml("image: registry/app\n"), &target("registry/app", "2.0"));
        assert_eq!(
            mutation.changes,
            vec![ImageChange {
                from: "registry/app".to_string(),
                to: "registry/app:2.0".to_string(),
            }]
        );
    }

    #[test]
    fn non_string_image_values_are_searched_recursively() {
        let doc = yaml("image:\n  repository: registry/app\n  nested:\n    image: registry/app:1\n");
        let mutation = retag(&doc, &target("registry/app", "2"));
        assert_eq!(mutation.changes.len(), 1);
        assert_eq!(
            mutation.document["image"]["nested"]["image"],
            Value::String("registry/app:2".to_string())
        );
        assert_eq!(
            mutation.document["image"]["repository"],
            Value::String("registry/app".to_string())
        );
    }

    #[test]
    fn keys_named_like_image_are_not_matched() {
        let doc = yaml("images: registry/app:1\nimageName: registry/app:1\n");
        assert!(retag(&doc, &target("registry/app", "2")).is_unchanged());
    }

    #[test]
    fn mapping_order_is_preserved() {
        let doc = yaml("zeta: 1\nimage: registry/app:1\nalpha: 2\n");
        let mutation = retag(&doc, &target("registry/app", "2"));
        let keys: Vec<_> = mutation
            .document
            .as_mapping()
            .expect("mapping")
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["zeta", "image", "alpha"]);
    }

    #[test]
    fn tagged_nodes_keep_their_tag() {
        let doc = yaml("spec: !Custom\n  image: registry/app:1\n");
        let mutation = retag(&doc, &target("registry/app", "2"));
        assert_eq!(mutation.changes.len(), 1);
        match &mutation.document["spec"] {
            Value::Tagged(tagged) => {
                assert_eq!(tagged.tag, "Custom");
                assert_eq!(tagged.value["image"], Value::String("registry/app:2".into()));
            }
            other => panic!("expected tagged node, got {other:?}"),
        }
    }

    #[test]
    fn scalars_pass_through() {
        for text in ["42", "true", "null", "plain string"] {
            let doc = yaml(text);
            assert_eq!(retag(&doc, &target("registry/app", "2")).document, doc);
        }
    }
}
