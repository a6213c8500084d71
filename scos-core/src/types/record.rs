//! Per-component migration record.

use crate::error::{Result, ScosError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Progress of a component through the pipeline.
///
/// Statuses are ordered: a record only ever moves to a later status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Pending,
    MetadataResolved,
    Fetched,
    Buildable,
    /// Rebuilt, pushed and digest-resolved.
    Succeeded,
    /// Could not be prepared for a build.
    Unbuildable,
    /// Prepared, but the build stage failed.
    Failed,
}

impl ComponentStatus {
    fn rank(self) -> u8 {
        match self {
            ComponentStatus::Pending => 0,
            ComponentStatus::MetadataResolved => 1,
            ComponentStatus::Fetched => 2,
            ComponentStatus::Buildable => 3,
            ComponentStatus::Succeeded | ComponentStatus::Unbuildable | ComponentStatus::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 4
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentStatus::Pending => "pending",
            ComponentStatus::MetadataResolved => "metadata_resolved",
            ComponentStatus::Fetched => "fetched",
            ComponentStatus::Buildable => "buildable",
            ComponentStatus::Succeeded => "succeeded",
            ComponentStatus::Unbuildable => "unbuildable",
            ComponentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentStatus {
    type Err = ScosError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "pending" => ComponentStatus::Pending,
            "metadata_resolved" => ComponentStatus::MetadataResolved,
            "fetched" => ComponentStatus::Fetched,
            "buildable" => ComponentStatus::Buildable,
            "succeeded" => ComponentStatus::Succeeded,
            "unbuildable" => ComponentStatus::Unbuildable,
            "failed" => ComponentStatus::Failed,
            other => return Err(ScosError::DatabaseError(format!("unknown status '{}'", other))),
        })
    }
}

/// Classified reason a component did not produce a replacement image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidReference,
    InspectionFailed,
    NoSourceUrl,
    CloneFailed,
    NoDockerfile,
    BuildFailed,
    PushFailed,
    NoDigest,
}

impl FailureReason {
    pub const ALL: [FailureReason; 8] = [
        FailureReason::InvalidReference,
        FailureReason::InspectionFailed,
        FailureReason::NoSourceUrl,
        FailureReason::CloneFailed,
        FailureReason::NoDockerfile,
        FailureReason::BuildFailed,
        FailureReason::PushFailed,
        FailureReason::NoDigest,
    ];

    /// Terminal status a record takes when failing for this reason.
    pub fn terminal_status(self) -> ComponentStatus {
        match self {
            FailureReason::BuildFailed | FailureReason::PushFailed | FailureReason::NoDigest => {
                ComponentStatus::Failed
            }
            _ => ComponentStatus::Unbuildable,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            FailureReason::InvalidReference => "invalid_reference",
            FailureReason::InspectionFailed => "inspection_failed",
            FailureReason::NoSourceUrl => "no_source_url",
            FailureReason::CloneFailed => "clone_failed",
            FailureReason::NoDockerfile => "no_dockerfile",
            FailureReason::BuildFailed => "build_failed",
            FailureReason::PushFailed => "push_failed",
            FailureReason::NoDigest => "no_digest",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FailureReason {
    type Err = ScosError;

    fn from_str(s: &str) -> Result<Self> {
        FailureReason::ALL
            .into_iter()
            .find(|r| r.code() == s)
            .ok_or_else(|| ScosError::DatabaseError(format!("unknown failure reason '{}'", s)))
    }
}

/// One manifest entry and everything the pipeline learned about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: String,
    pub original_digest: String,
    pub status: ComponentStatus,
    pub vcs_url: Option<String>,
    pub vcs_ref: Option<String>,
    /// Ref actually cloned; differs from `vcs_ref` only after the `master` -> `main` fallback.
    pub resolved_ref: Option<String>,
    pub revision: Option<String>,
    /// Recipe path relative to the cloned source root.
    pub dockerfile_path: Option<PathBuf>,
    /// Number of base-image lines rewritten in the recipe.
    pub rewritten_lines: Option<usize>,
    pub replacement_image: Option<String>,
    pub failure_reason: Option<FailureReason>,
    /// Free-form context for the failure (collaborator stderr, missing keys).
    pub failure_detail: Option<String>,
}

impl ComponentRecord {
    pub fn new(name: impl Into<String>, original_digest: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_digest: original_digest.into(),
            status: ComponentStatus::Pending,
            vcs_url: None,
            vcs_ref: None,
            resolved_ref: None,
            revision: None,
            dockerfile_path: None,
            rewritten_lines: None,
            replacement_image: None,
            failure_reason: None,
            failure_detail: None,
        }
    }

    /// A record rejected at load time, terminal before any stage runs.
    pub fn rejected(
        name: impl Into<String>,
        original_digest: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let detail = detail.into();
        Self {
            status: FailureReason::InvalidReference.terminal_status(),
            failure_reason: Some(FailureReason::InvalidReference),
            failure_detail: if detail.is_empty() { None } else { Some(detail) },
            ..Self::new(name, original_digest)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.status == ComponentStatus::Succeeded
    }

    /// Fail unless the record is currently in `expected`.
    pub fn require(&self, expected: ComponentStatus) -> Result<()> {
        if self.status != expected {
            return Err(ScosError::InvalidTransition {
                component: self.name.clone(),
                from: self.status.to_string(),
                to: format!("stage after {}", expected),
            });
        }
        Ok(())
    }

    /// Move to a later, non-terminal status.
    pub fn advance(&mut self, to: ComponentStatus) -> Result<()> {
        if to.is_terminal() || to.rank() <= self.status.rank() {
            return Err(self.transition_error(to));
        }
        self.status = to;
        Ok(())
    }

    /// Reach `Succeeded` with the given replacement image.
    pub fn succeed(&mut self, replacement_image: String) -> Result<()> {
        if self.is_terminal() {
            return Err(self.transition_error(ComponentStatus::Succeeded));
        }
        self.status = ComponentStatus::Succeeded;
        self.replacement_image = Some(replacement_image);
        self.failure_reason = None;
        self.failure_detail = None;
        Ok(())
    }

    /// Reach the terminal status implied by `reason`.
    pub fn fail(&mut self, reason: FailureReason, detail: impl Into<String>) -> Result<()> {
        let to = reason.terminal_status();
        if self.is_terminal() {
            return Err(self.transition_error(to));
        }
        self.status = to;
        self.failure_reason = Some(reason);
        self.replacement_image = None;
        let detail = detail.into();
        self.failure_detail = if detail.is_empty() { None } else { Some(detail) };
        Ok(())
    }

    /// Image this component contributes to the final release.
    pub fn final_image(&self) -> &str {
        match (&self.status, &self.replacement_image) {
            (ComponentStatus::Succeeded, Some(image)) => image,
            _ => &self.original_digest,
        }
    }

    fn transition_error(&self, to: ComponentStatus) -> ScosError {
        ScosError::InvalidTransition {
            component: self.name.clone(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_pending() {
        let record = ComponentRecord::new("cli", "reg/cli@sha256:aaa");
        assert_eq!(record.status, ComponentStatus::Pending);
        assert!(!record.is_terminal());
        assert_eq!(record.final_image(), "reg/cli@sha256:aaa");
    }

    #[test]
    fn test_rejected_record_is_terminal() {
        let record = ComponentRecord::rejected("cli", "reg/cli:latest", "missing '@'");
        assert_eq!(record.status, ComponentStatus::Unbuildable);
        assert_eq!(record.failure_reason, Some(FailureReason::InvalidReference));
        assert_eq!(record.failure_detail.as_deref(), Some("missing '@'"));
        assert!(record.replacement_image.is_none());
        assert_eq!(record.final_image(), "reg/cli:latest");
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut record = ComponentRecord::new("cli", "reg/cli@sha256:aaa");
        record.advance(ComponentStatus::MetadataResolved).unwrap();
        record.advance(ComponentStatus::Fetched).unwrap();
        assert!(record.advance(ComponentStatus::MetadataResolved).is_err());
        assert!(record.advance(ComponentStatus::Fetched).is_err());
        assert!(record.advance(ComponentStatus::Succeeded).is_err());
        assert_eq!(record.status, ComponentStatus::Fetched);
    }

    #[test]
    fn test_fail_sets_exactly_one_outcome() {
        let mut record = ComponentRecord::new("cli", "reg/cli@sha256:aaa");
        record.fail(FailureReason::NoSourceUrl, "").unwrap();
        assert_eq!(record.status, ComponentStatus::Unbuildable);
        assert_eq!(record.failure_reason, Some(FailureReason::NoSourceUrl));
        assert!(record.replacement_image.is_none());
        assert!(record.failure_detail.is_none());
    }

    #[test]
    fn test_build_reasons_are_failed() {
        for reason in [FailureReason::BuildFailed, FailureReason::PushFailed, FailureReason::NoDigest]
        {
            assert_eq!(reason.terminal_status(), ComponentStatus::Failed);
        }
        assert_eq!(FailureReason::CloneFailed.terminal_status(), ComponentStatus::Unbuildable);
    }

    #[test]
    fn test_terminal_records_are_frozen() {
        let mut record = ComponentRecord::new("cli", "reg/cli@sha256:aaa");
        record.succeed("reg2/cli@sha256:bbb".into()).unwrap();
        assert!(record.fail(FailureReason::PushFailed, "late").is_err());
        assert!(record.succeed("reg2/cli@sha256:ccc".into()).is_err());
        assert_eq!(record.final_image(), "reg2/cli@sha256:bbb");
        assert!(record.failure_reason.is_none());
    }

    #[test]
    fn test_require() {
        let record = ComponentRecord::new("cli", "reg/cli@sha256:aaa");
        assert!(record.require(ComponentStatus::Pending).is_ok());
        assert!(matches!(
            record.require(ComponentStatus::Fetched),
            Err(ScosError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_codes_round_trip_through_from_str() {
        for reason in FailureReason::ALL {
            assert_eq!(reason.code().parse::<FailureReason>().unwrap(), reason);
        }
        assert_eq!("fetched".parse::<ComponentStatus>().unwrap(), ComponentStatus::Fetched);
        assert!("exploded".parse::<FailureReason>().is_err());
    }

    #[test]
    fn test_serde_uses_reason_codes() {
        let json = serde_json::to_string(&FailureReason::NoDockerfile).unwrap();
        assert_eq!(json, "\"no_dockerfile\"");
    }
}
