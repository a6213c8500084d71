//! Final manifest merge.
//!
//! Pure function of the original manifest and the record set: every manifest
//! key appears exactly once, carrying the replacement image when its record
//! succeeded and the original reference otherwise.

use crate::manifest::Manifest;
use crate::types::ComponentRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One `component -> image` line of the final release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub component: String,
    pub image: String,
    pub replaced: bool,
}

/// Component to image mapping in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalMapping {
    entries: Vec<MappingEntry>,
}

impl FinalMapping {
    pub fn from_entries(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn get(&self, component: &str) -> Option<&str> {
        self.entries.iter().find(|e| e.component == component).map(|e| e.image.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.component.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn replaced_count(&self) -> usize {
        self.entries.iter().filter(|e| e.replaced).count()
    }
}

/// Merge result, including whether the release root needs an override directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub mapping: FinalMapping,
    /// Replacement image of the release-root component, when it was rebuilt.
    pub base_image_override: Option<String>,
}

/// Merge `records` over `manifest`.
///
/// Records for names outside the manifest are ignored; manifest names without
/// a record keep their original reference.
pub fn merge(manifest: &Manifest, records: &[ComponentRecord], release_root: &str) -> MergeOutcome {
    let by_name: HashMap<&str, &ComponentRecord> =
        records.iter().map(|r| (r.name.as_str(), r)).collect();

    let entries = manifest
        .entries()
        .iter()
        .map(|entry| {
            let replacement = by_name
                .get(entry.name.as_str())
                .filter(|r| r.succeeded())
                .and_then(|r| r.replacement_image.clone());
            match replacement {
                Some(image) => {
                    MappingEntry { component: entry.name.clone(), image, replaced: true }
                }
                None => MappingEntry {
                    component: entry.name.clone(),
                    image: entry.reference.clone(),
                    replaced: false,
                },
            }
        })
        .collect::<Vec<_>>();

    let base_image_override =
        entries.iter().find(|e| e.component == release_root && e.replaced).map(|e| e.image.clone());

    MergeOutcome { mapping: FinalMapping { entries }, base_image_override }
}
