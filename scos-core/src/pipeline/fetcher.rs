//! Source fetching with the `master` -> `main` branch fallback.

use crate::adapters::SourceCloner;
use crate::error::{Result, ScosError};
use crate::types::{ComponentRecord, ComponentStatus, FailureReason};
use std::path::Path;
use tracing::{info, instrument, warn};

/// The only ref that is retried, and what it is retried as.
pub const FALLBACK_FROM: &str = "master";
pub const FALLBACK_TO: &str = "main";

/// Clone the resolved source of a `MetadataResolved` record into `dest`.
#[instrument(skip_all, fields(component = %record.name))]
pub async fn fetch(
    cloner: &dyn SourceCloner,
    record: &mut ComponentRecord,
    dest: &Path,
) -> Result<()> {
    record.require(ComponentStatus::MetadataResolved)?;

    let url = record.vcs_url.clone().ok_or_else(|| {
        ScosError::Internal(format!("{} is metadata_resolved without a source url", record.name))
    })?;
    let git_ref = record
        .resolved_ref
        .clone()
        .or_else(|| record.vcs_ref.clone())
        .unwrap_or_else(|| FALLBACK_FROM.to_string());

    let cloned = match cloner.clone_source(&url, &git_ref, dest).await {
        Ok(out) => Ok(out),
        Err(e) if git_ref == FALLBACK_FROM => {
            warn!("clone of '{}' failed ({}), retrying with '{}'", git_ref, e, FALLBACK_TO);
            cloner.clone_source(&url, FALLBACK_TO, dest).await.map(|out| {
                record.resolved_ref = Some(FALLBACK_TO.to_string());
                out
            })
        }
        Err(e) => Err(e),
    };

    match cloned {
        Ok(out) => {
            info!(git_ref = ?record.resolved_ref, revision = %out.revision, "fetched source");
            record.revision = Some(out.revision);
            record.advance(ComponentStatus::Fetched)
        }
        Err(e) => {
            warn!("clone failed: {}", e);
            metrics::counter!("scos_stage_failures_total", "reason" => "clone_failed").increment(1);
            record.fail(FailureReason::CloneFailed, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CloneOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Succeeds only for the listed refs and remembers every attempt.
    struct RefCloner {
        accepts: Vec<&'static str>,
        attempts: Mutex<Vec<String>>,
    }

    impl RefCloner {
        fn new(accepts: Vec<&'static str>) -> Self {
            Self { accepts, attempts: Mutex::new(Vec::new()) }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceCloner for RefCloner {
        async fn clone_source(&self, _url: &str, git_ref: &str, _dest: &Path) -> Result<CloneOutput> {
            self.attempts.lock().unwrap().push(git_ref.to_string());
            if self.accepts.iter().any(|r| *r == git_ref) {
                Ok(CloneOutput { revision: format!("rev-{}", git_ref) })
            } else {
                Err(ScosError::collaborator("git", format!("Remote branch {} not found", git_ref)))
            }
        }
    }

    fn resolved(git_ref: &str) -> ComponentRecord {
        let mut record = ComponentRecord::new("cli", "reg/cli@sha256:aaa");
        record.vcs_url = Some("https://github.com/openshift/oc".into());
        record.vcs_ref = Some(git_ref.into());
        record.resolved_ref = Some(git_ref.into());
        record.advance(ComponentStatus::MetadataResolved).unwrap();
        record
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let cloner = RefCloner::new(vec!["release-4.16"]);
        let mut record = resolved("release-4.16");
        fetch(&cloner, &mut record, Path::new("/tmp/unused")).await.unwrap();

        assert_eq!(record.status, ComponentStatus::Fetched);
        assert_eq!(record.revision.as_deref(), Some("rev-release-4.16"));
        assert_eq!(record.resolved_ref.as_deref(), Some("release-4.16"));
        assert_eq!(cloner.attempts(), vec!["release-4.16"]);
    }

    #[tokio::test]
    async fn test_master_falls_back_to_main() {
        let cloner = RefCloner::new(vec!["main"]);
        let mut record = resolved("master");
        fetch(&cloner, &mut record, Path::new("/tmp/unused")).await.unwrap();

        assert_eq!(record.status, ComponentStatus::Fetched);
        assert_eq!(record.resolved_ref.as_deref(), Some("main"));
        assert_eq!(record.vcs_ref.as_deref(), Some("master"));
        assert_eq!(record.revision.as_deref(), Some("rev-main"));
        assert_eq!(cloner.attempts(), vec!["master", "main"]);
    }

    #[tokio::test]
    async fn test_master_and_main_both_fail() {
        let cloner = RefCloner::new(vec![]);
        let mut record = resolved("master");
        fetch(&cloner, &mut record, Path::new("/tmp/unused")).await.unwrap();

        assert_eq!(record.status, ComponentStatus::Unbuildable);
        assert_eq!(record.failure_reason, Some(FailureReason::CloneFailed));
        assert_eq!(record.resolved_ref.as_deref(), Some("master"));
        assert_eq!(cloner.attempts(), vec!["master", "main"]);
    }

    #[tokio::test]
    async fn test_other_refs_are_not_retried() {
        let cloner = RefCloner::new(vec!["main"]);
        let mut record = resolved("release-4.15");
        fetch(&cloner, &mut record, Path::new("/tmp/unused")).await.unwrap();

        assert_eq!(record.failure_reason, Some(FailureReason::CloneFailed));
        assert_eq!(cloner.attempts(), vec!["release-4.15"]);
    }

    #[tokio::test]
    async fn test_fetch_requires_metadata() {
        let cloner = RefCloner::new(vec!["main"]);
        let mut record = ComponentRecord::new("cli", "reg/cli@sha256:aaa");
        assert!(fetch(&cloner, &mut record, Path::new("/tmp/unused")).await.is_err());
        assert!(cloner.attempts().is_empty());
    }
}
