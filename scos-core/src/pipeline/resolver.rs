//! Metadata resolution: source digest to VCS coordinates.

use crate::adapters::ImageInspector;
use crate::error::Result;
use crate::types::{ComponentRecord, ComponentStatus, FailureReason};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Labels carrying the source repository URL, in priority order.
pub const SOURCE_URL_LABELS: [&str; 3] =
    ["io.openshift.build.source-location", "org.opencontainers.image.source", "vcs-url"];

/// Labels carrying the source ref, in priority order.
pub const SOURCE_REF_LABELS: [&str; 2] =
    ["io.openshift.build.commit.ref", "org.opencontainers.image.ref.name"];

/// Ref used when no ref label is present.
pub const DEFAULT_REF: &str = "master";

/// First non-empty value among `keys`.
fn first_label<'a>(labels: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| labels.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty() && *v != "null" && *v != "<no value>")
}

/// Resolve the source coordinates of a `Pending` record.
///
/// Inspection failures and missing source URLs are terminal for the record
/// only; the returned error is reserved for precondition violations.
#[instrument(skip_all, fields(component = %record.name))]
pub async fn resolve(inspector: &dyn ImageInspector, record: &mut ComponentRecord) -> Result<()> {
    record.require(ComponentStatus::Pending)?;

    let info = match inspector.inspect(&record.original_digest).await {
        Ok(info) => info,
        Err(e) => {
            warn!("inspection failed: {}", e);
            metrics::counter!("scos_stage_failures_total", "reason" => "inspection_failed")
                .increment(1);
            return record.fail(FailureReason::InspectionFailed, e.to_string());
        }
    };

    let Some(url) = first_label(&info.labels, &SOURCE_URL_LABELS) else {
        warn!("image carries none of {:?}", SOURCE_URL_LABELS);
        metrics::counter!("scos_stage_failures_total", "reason" => "no_source_url").increment(1);
        return record.fail(FailureReason::NoSourceUrl, "");
    };
    let git_ref = first_label(&info.labels, &SOURCE_REF_LABELS).unwrap_or(DEFAULT_REF);

    info!(url = %url, git_ref = %git_ref, "resolved source");
    record.vcs_url = Some(url.to_string());
    record.vcs_ref = Some(git_ref.to_string());
    record.resolved_ref = Some(git_ref.to_string());
    record.advance(ComponentStatus::MetadataResolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ImageInfo;
    use crate::error::ScosError;
    use async_trait::async_trait;

    struct FixedInspector(Option<HashMap<String, String>>);

    #[async_trait]
    impl ImageInspector for FixedInspector {
        async fn inspect(&self, _image_ref: &str) -> Result<ImageInfo> {
            match &self.0 {
                Some(labels) => Ok(ImageInfo { labels: labels.clone(), digest: "sha256:00".into() }),
                None => Err(ScosError::collaborator("skopeo", "unauthorized")),
            }
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn pending() -> ComponentRecord {
        ComponentRecord::new("cli", "reg/cli@sha256:aaa")
    }

    #[tokio::test]
    async fn test_resolve_uses_first_url_and_ref() {
        let inspector = FixedInspector(Some(labels(&[
            ("vcs-url", "https://example.com/fallback"),
            ("io.openshift.build.source-location", "https://github.com/openshift/oc"),
            ("io.openshift.build.commit.ref", "release-4.16"),
        ])));
        let mut record = pending();
        resolve(&inspector, &mut record).await.unwrap();

        assert_eq!(record.status, ComponentStatus::MetadataResolved);
        assert_eq!(record.vcs_url.as_deref(), Some("https://github.com/openshift/oc"));
        assert_eq!(record.vcs_ref.as_deref(), Some("release-4.16"));
        assert_eq!(record.resolved_ref, record.vcs_ref);
    }

    #[tokio::test]
    async fn test_empty_labels_are_skipped() {
        let inspector = FixedInspector(Some(labels(&[
            ("io.openshift.build.source-location", ""),
            ("org.opencontainers.image.source", "https://github.com/openshift/installer"),
            ("io.openshift.build.commit.ref", "null"),
        ])));
        let mut record = pending();
        resolve(&inspector, &mut record).await.unwrap();

        assert_eq!(record.vcs_url.as_deref(), Some("https://github.com/openshift/installer"));
        assert_eq!(record.vcs_ref.as_deref(), Some("master"));
    }

    #[tokio::test]
    async fn test_missing_ref_defaults_to_master() {
        let inspector = FixedInspector(Some(labels(&[("vcs-url", "https://github.com/x/y")])));
        let mut record = pending();
        resolve(&inspector, &mut record).await.unwrap();
        assert_eq!(record.resolved_ref.as_deref(), Some(DEFAULT_REF));
    }

    #[tokio::test]
    async fn test_no_url_is_unbuildable() {
        let inspector = FixedInspector(Some(labels(&[("io.openshift.build.commit.ref", "main")])));
        let mut record = pending();
        resolve(&inspector, &mut record).await.unwrap();

        assert_eq!(record.status, ComponentStatus::Unbuildable);
        assert_eq!(record.failure_reason, Some(FailureReason::NoSourceUrl));
        assert!(record.vcs_url.is_none());
    }

    #[tokio::test]
    async fn test_inspection_failure_is_unbuildable() {
        let mut record = pending();
        resolve(&FixedInspector(None), &mut record).await.unwrap();

        assert_eq!(record.status, ComponentStatus::Unbuildable);
        assert_eq!(record.failure_reason, Some(FailureReason::InspectionFailed));
        assert!(record.failure_detail.as_deref().unwrap().contains("unauthorized"));
    }

    #[tokio::test]
    async fn test_resolve_requires_pending() {
        let mut record = pending();
        record.advance(ComponentStatus::MetadataResolved).unwrap();
        let err = resolve(&FixedInspector(None), &mut record).await.unwrap_err();
        assert!(matches!(err, ScosError::InvalidTransition { .. }));
    }
}
