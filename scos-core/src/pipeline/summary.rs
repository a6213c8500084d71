//! Run summaries derived purely from the record set.

use crate::types::{ComponentRecord, ComponentStatus, FailureReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    /// Ready to build (pre-build summary) or still in flight.
    pub pending: usize,
    pub buildable: usize,
    pub unbuildable: BTreeMap<FailureReason, usize>,
    pub failed: BTreeMap<FailureReason, usize>,
}

impl RunSummary {
    pub fn from_records(records: &[ComponentRecord]) -> Self {
        let mut summary = RunSummary { total: records.len(), ..Default::default() };
        for record in records {
            match (record.status, record.failure_reason) {
                (ComponentStatus::Succeeded, _) => summary.succeeded += 1,
                (ComponentStatus::Buildable, _) => summary.buildable += 1,
                (ComponentStatus::Unbuildable, Some(reason)) => {
                    *summary.unbuildable.entry(reason).or_default() += 1
                }
                (ComponentStatus::Failed, Some(reason)) => {
                    *summary.failed.entry(reason).or_default() += 1
                }
                _ => summary.pending += 1,
            }
        }
        summary
    }

    pub fn unbuildable_count(&self) -> usize {
        self.unbuildable.values().sum()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.values().sum()
    }

    /// Components that keep their original image in the final release.
    pub fn fallbacks(&self) -> usize {
        self.total - self.succeeded
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} components: {} rebuilt, {} buildable, {} unbuildable, {} failed, {} falling back",
            self.total,
            self.succeeded,
            self.buildable,
            self.unbuildable_count(),
            self.failed_count(),
            self.fallbacks()
        )?;
        for (reason, count) in self.unbuildable.iter().chain(self.failed.iter()) {
            writeln!(f, "  {:<18} {}", reason.code(), count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(name: &str, setup: impl FnOnce(&mut ComponentRecord)) -> ComponentRecord {
        let mut record = ComponentRecord::new(name, format!("reg/{}@sha256:aa", name));
        setup(&mut record);
        record
    }

    #[test]
    fn test_counts_per_reason() {
        let records = vec![
            with("a", |r| r.succeed("reg2/a@sha256:11".into()).unwrap()),
            with("b", |r| r.fail(FailureReason::NoDockerfile, "").unwrap()),
            with("c", |r| r.fail(FailureReason::NoDockerfile, "").unwrap()),
            with("d", |r| r.fail(FailureReason::PushFailed, "").unwrap()),
            with("e", |r| r.advance(ComponentStatus::Buildable).unwrap()),
            with("f", |_| {}),
        ];
        let summary = RunSummary::from_records(&records);

        assert_eq!(summary.total, 6);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.buildable, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.unbuildable.get(&FailureReason::NoDockerfile), Some(&2));
        assert_eq!(summary.failed.get(&FailureReason::PushFailed), Some(&1));
        assert_eq!(summary.fallbacks(), 5);
    }

    #[test]
    fn test_display_lists_reasons() {
        let records = vec![with("b", |r| r.fail(FailureReason::CloneFailed, "").unwrap())];
        let text = RunSummary::from_records(&records).to_string();
        assert!(text.starts_with("1 components: 0 rebuilt"));
        assert!(text.contains("clone_failed"));
    }
}
