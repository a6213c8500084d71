//! Manifest loading.
//!
//! A manifest maps component names to digest-pinned image references. Two
//! input shapes are accepted:
//! - a plain mapping (JSON or YAML) of `name: reference`
//! - a release `image-references` document (`kind: ImageStream` with
//!   `spec.tags[].{name, from.name}`)
//!
//! Entry order is preserved; it is the order components are processed in and
//! the order of the final release mappings.

use crate::error::{Result, ScosError};
use crate::types::{ComponentRecord, ImageReference};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::{Component, Path};
use tracing::{info, instrument, warn};

/// One `name -> reference` pair as written in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub reference: String,
}

/// Ordered component manifest. The sole source of truth for the component set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from ordered pairs, rejecting empty or duplicate names.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (name, reference) in pairs {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(ScosError::InvalidManifest {
                    reason: "component name must not be empty".into(),
                });
            }
            if !is_plain_name(&name) {
                return Err(ScosError::InvalidManifest {
                    reason: format!("component name '{}' must be a single path segment", name),
                });
            }
            if !seen.insert(name.clone()) {
                return Err(ScosError::InvalidManifest {
                    reason: format!("duplicate component '{}'", name),
                });
            }
            entries.push(ManifestEntry { name, reference: reference.into() });
        }
        if entries.is_empty() {
            return Err(ScosError::InvalidManifest { reason: "manifest is empty".into() });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.reference.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create the initial record set: one `Pending` record per entry, or an
    /// immediately terminal `invalid_reference` record for malformed references.
    pub fn initial_records(&self) -> Vec<ComponentRecord> {
        self.entries
            .iter()
            .map(|entry| match ImageReference::parse(&entry.reference) {
                Ok(_) => ComponentRecord::new(&entry.name, &entry.reference),
                Err(e) => {
                    warn!(component = %entry.name, reference = %entry.reference, "rejecting entry: {}", e);
                    ComponentRecord::rejected(&entry.name, &entry.reference, e.to_string())
                }
            })
            .collect()
    }
}

/// Component names double as directory names under the sources root.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !name.contains(['/', '\\'])
}

/// Parse a manifest document from a string.
#[instrument(skip(content))]
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    let document: Value = serde_yaml::from_str(content)
        .map_err(|e| ScosError::InvalidManifest { reason: e.to_string() })?;

    let mapping = match &document {
        Value::Mapping(m) => m,
        other => {
            return Err(ScosError::InvalidManifest {
                reason: format!("expected a mapping at the top level, found {}", kind_of(other)),
            })
        }
    };

    let is_image_stream = mapping.get("kind").and_then(Value::as_str) == Some("ImageStream");
    let manifest = if is_image_stream {
        parse_image_references(&document)?
    } else {
        let mut pairs = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let name = key.as_str().ok_or_else(|| ScosError::InvalidManifest {
                reason: format!("component names must be strings, found {}", kind_of(key)),
            })?;
            pairs.push((name.to_string(), scalar_reference(name, value)?));
        }
        Manifest::from_pairs(pairs)?
    };

    info!("Parsed manifest with {} components", manifest.len());
    Ok(manifest)
}

/// Load and parse a manifest file.
#[instrument]
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ScosError::ManifestReadError { path: path.to_path_buf(), source: e })?;
    parse_manifest(&content)
}

#[derive(Deserialize)]
struct ImageStream {
    spec: ImageStreamSpec,
}

#[derive(Deserialize)]
struct ImageStreamSpec {
    #[serde(default)]
    tags: Vec<ImageStreamTag>,
}

#[derive(Deserialize)]
struct ImageStreamTag {
    name: String,
    from: Option<TagReference>,
}

#[derive(Deserialize)]
struct TagReference {
    #[serde(default)]
    name: String,
}

fn parse_image_references(document: &Value) -> Result<Manifest> {
    let stream: ImageStream = serde_yaml::from_value(document.clone())
        .map_err(|e| ScosError::InvalidManifest { reason: e.to_string() })?;

    Manifest::from_pairs(
        stream
            .spec
            .tags
            .into_iter()
            .map(|tag| (tag.name, tag.from.map(|f| f.name).unwrap_or_default())),
    )
}

/// Scalars are kept (and later rejected per entry); nested values reject the manifest.
fn scalar_reference(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(ScosError::InvalidManifest {
            reason: format!("component '{}' maps to a {}, expected a reference", name, kind_of(other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComponentStatus, FailureReason};

    #[test]
    fn test_parse_json_mapping_keeps_order() {
        let manifest = parse_manifest(
            r#"{"zeta": "reg/z@sha256:aaa", "alpha": "reg/a@sha256:bbb", "mid": "reg/m@sha256:ccc"}"#,
        )
        .unwrap();
        assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(manifest.get("alpha"), Some("reg/a@sha256:bbb"));
    }

    #[test]
    fn test_parse_yaml_mapping() {
        let manifest = parse_manifest(
            "cli: quay.io/okd/content@sha256:0a\ncluster-version-operator: quay.io/okd/content@sha256:0b\n",
        )
        .unwrap();
        assert_eq!(manifest.len(), 2);
        assert!(manifest.contains("cluster-version-operator"));
    }

    #[test]
    fn test_parse_image_references() {
        let manifest = parse_manifest(
            r#"{
                "kind": "ImageStream",
                "apiVersion": "image.openshift.io/v1",
                "spec": {"tags": [
                    {"name": "cli", "from": {"kind": "DockerImage", "name": "reg/cli@sha256:aaa"}},
                    {"name": "installer", "from": {"kind": "DockerImage", "name": "reg/inst@sha256:bbb"}}
                ]}
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["cli", "installer"]);
        assert_eq!(manifest.get("installer"), Some("reg/inst@sha256:bbb"));
    }

    #[test]
    fn test_empty_manifest_is_invalid() {
        assert!(matches!(parse_manifest("{}"), Err(ScosError::InvalidManifest { .. })));
    }

    #[test]
    fn test_non_mapping_is_invalid() {
        assert!(matches!(parse_manifest("- a\n- b\n"), Err(ScosError::InvalidManifest { .. })));
        assert!(matches!(parse_manifest("not a manifest"), Err(ScosError::InvalidManifest { .. })));
    }

    #[test]
    fn test_duplicate_keys_are_invalid() {
        assert!(matches!(
            parse_manifest("cli: reg/a@sha256:aa\ncli: reg/b@sha256:bb\n"),
            Err(ScosError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_nested_value_is_invalid() {
        assert!(matches!(
            parse_manifest("cli:\n  image: reg/a@sha256:aa\n"),
            Err(ScosError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_empty_name_is_invalid() {
        assert!(matches!(
            parse_manifest(r#"{"": "reg/a@sha256:aa"}"#),
            Err(ScosError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_names_must_be_single_path_segments() {
        for name in ["..", ".", "../x", "a/b", "/abs", "a\\b"] {
            let err = Manifest::from_pairs([(name, "reg/a@sha256:aa")]).unwrap_err();
            assert!(matches!(err, ScosError::InvalidManifest { .. }), "accepted {:?}", name);
        }
        assert!(Manifest::from_pairs([("cluster-version-operator", "reg/a@sha256:aa")]).is_ok());
        assert!(Manifest::from_pairs([("cli.v2", "reg/a@sha256:aa")]).is_ok());
    }

    #[test]
    fn test_escaping_name_in_document_is_invalid() {
        assert!(matches!(
            parse_manifest(r#"{"..": "reg/a@sha256:aa"}"#),
            Err(ScosError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_bad_reference_yields_terminal_record() {
        let manifest = parse_manifest(
            r#"{"good": "reg/g@sha256:aaa", "tagged": "reg/t:latest", "number": 42}"#,
        )
        .unwrap();
        let records = manifest.initial_records();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].status, ComponentStatus::Pending);
        assert_eq!(records[1].status, ComponentStatus::Unbuildable);
        assert_eq!(records[1].failure_reason, Some(FailureReason::InvalidReference));
        assert_eq!(records[1].original_digest, "reg/t:latest");
        assert_eq!(records[2].failure_reason, Some(FailureReason::InvalidReference));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_manifest(Path::new("/nonexistent/manifest.json")).unwrap_err();
        assert!(matches!(err, ScosError::ManifestReadError { .. }));
    }
}
