//! Migration pipeline.
//!
//! Per-component stages, in order:
//! - [`resolver`]: image labels to VCS coordinates
//! - [`fetcher`]: shallow clone with the `master` to `main` fallback
//! - [`locator`]: recipe search plus the base-image rewrite ([`transform`])
//! - [`executor`]: build, push, digest capture
//!
//! Then, once every record is terminal, [`merger`] and [`release`] produce
//! the final mapping and the composition command. [`Pipeline`] drives the
//! whole run sequentially and persists every record after each transition,
//! so an interrupted run resumes where it stopped.

pub mod executor;
pub mod fetcher;
pub mod locator;
pub mod merger;
pub mod release;
pub mod resolver;
pub mod summary;
pub mod transform;

use crate::adapters::Collaborators;
use crate::config::RunContext;
use crate::error::{Result, ScosError};
use crate::manifest::Manifest;
use crate::state::StateManager;
use crate::types::{ComponentRecord, ComponentStatus};
use merger::FinalMapping;
use release::ReleaseCommand;
use std::collections::HashMap;
use summary::RunSummary;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

pub use merger::{merge, MergeOutcome};
pub use release::build_release_command;

/// Phase a progress update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Preparing,
    Building,
    Composing,
}

/// Progress update emitted while a run advances.
#[derive(Debug, Clone)]
pub struct RunProgress {
    pub stage: RunStage,
    pub component: Option<String>,
    pub message: String,
    /// Components handled so far in this phase.
    pub done: usize,
    pub total: usize,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub mapping: FinalMapping,
    pub command: ReleaseCommand,
    /// True when the composition collaborator was invoked and succeeded.
    pub composed: bool,
}

/// Sequential driver for a whole migration run.
pub struct Pipeline {
    ctx: RunContext,
    collaborators: Collaborators,
    state: StateManager,
    progress: Option<mpsc::Sender<RunProgress>>,
}

impl Pipeline {
    pub fn new(ctx: RunContext, collaborators: Collaborators, state: StateManager) -> Self {
        Self { ctx, collaborators, state, progress: None }
    }

    /// Stream progress updates to `tx`.
    pub fn with_progress(mut self, tx: mpsc::Sender<RunProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    async fn report(&self, stage: RunStage, record: Option<&ComponentRecord>, done: usize, total: usize) {
        let Some(tx) = &self.progress else { return };
        let message = match record {
            Some(r) => format!("{}: {}", r.name, r.status),
            None => format!("{:?}", stage).to_lowercase(),
        };
        let _ = tx
            .send(RunProgress {
                stage,
                component: record.map(|r| r.name.clone()),
                message,
                done,
                total,
            })
            .await;
    }

    /// Run the full migration for `manifest`.
    ///
    /// Per-component failures end up on the records. The returned error is
    /// reserved for run-level conditions: an aborted confirmation, zero
    /// successful builds, or a store/collaborator fault outside any stage.
    #[instrument(skip_all, fields(components = manifest.len()))]
    pub async fn run(&self, manifest: &Manifest) -> Result<RunReport> {
        let mut records = self.load_records(manifest).await?;

        self.prepare(&mut records).await?;

        let pre_build = RunSummary::from_records(&records);
        info!("pre-build summary: {}", pre_build.to_string().trim_end());
        if pre_build.buildable > 0 {
            let prompt = format!("Proceed with {} builds?", pre_build.buildable);
            if !self.collaborators.confirm.confirm(&prompt) {
                return Err(ScosError::Aborted { stage: "before builds".into() });
            }
        }

        self.build_all(&mut records).await?;

        self.finish(manifest, &records).await
    }

    /// Save the manifest and return one record per manifest key.
    ///
    /// A stored record is reused only while its reference still matches the
    /// manifest; new keys and changed references get a fresh record.
    pub async fn load_records(&self, manifest: &Manifest) -> Result<Vec<ComponentRecord>> {
        self.state.save_manifest(manifest).await?;

        let mut stored: HashMap<String, ComponentRecord> = self
            .state
            .list_records()
            .await?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut records = Vec::with_capacity(manifest.len());
        let mut resumed = 0;
        for record in manifest.initial_records() {
            match stored.remove(&record.name) {
                Some(existing) if existing.original_digest == record.original_digest => {
                    resumed += 1;
                    records.push(existing);
                }
                Some(existing) => {
                    info!(
                        component = %record.name,
                        previous = %existing.original_digest,
                        current = %record.original_digest,
                        "reference changed; starting over"
                    );
                    self.state.upsert_record(&record).await?;
                    records.push(record);
                }
                None => {
                    self.state.upsert_record(&record).await?;
                    records.push(record);
                }
            }
        }
        if resumed > 0 {
            info!(resumed, "resuming from stored records");
        }
        Ok(records)
    }

    /// Resolve, fetch and locate every non-terminal record up to `Buildable`.
    pub async fn prepare(&self, records: &mut [ComponentRecord]) -> Result<()> {
        let total = records.len();
        for (done, record) in records.iter_mut().enumerate() {
            self.prepare_one(record).await?;
            self.report(RunStage::Preparing, Some(record), done + 1, total).await;
        }
        Ok(())
    }

    async fn prepare_one(&self, record: &mut ComponentRecord) -> Result<()> {
        loop {
            match record.status {
                ComponentStatus::Pending => {
                    resolver::resolve(self.collaborators.inspector.as_ref(), record).await?
                }
                ComponentStatus::MetadataResolved => {
                    let dest = self.ctx.source_dir(&record.name);
                    fetcher::fetch(self.collaborators.cloner.as_ref(), record, &dest).await?
                }
                ComponentStatus::Fetched => {
                    locator::locate(record, &self.ctx.source_dir(&record.name))?
                }
                _ => return Ok(()),
            }
            self.state.upsert_record(record).await?;
        }
    }

    /// Build every `Buildable` record.
    pub async fn build_all(&self, records: &mut [ComponentRecord]) -> Result<()> {
        let total = records.iter().filter(|r| r.status == ComponentStatus::Buildable).count();
        let mut done = 0;
        for record in records.iter_mut().filter(|r| r.status == ComponentStatus::Buildable) {
            let source_root = self.ctx.source_dir(&record.name);
            executor::build(
                &self.ctx,
                self.collaborators.builder.as_ref(),
                self.collaborators.inspector.as_ref(),
                record,
                &source_root,
            )
            .await?;
            self.state.upsert_record(record).await?;
            done += 1;
            self.report(RunStage::Building, Some(record), done, total).await;

            if record.status == ComponentStatus::Failed && !self.ctx.continue_on_failure {
                let prompt = format!("Build of {} failed. Continue?", record.name);
                if !self.collaborators.confirm.confirm(&prompt) {
                    return Err(ScosError::Aborted { stage: format!("after {} failed", record.name) });
                }
            }
        }
        Ok(())
    }

    /// Merge, persist the final artifacts and optionally compose.
    pub async fn finish(&self, manifest: &Manifest, records: &[ComponentRecord]) -> Result<RunReport> {
        let summary = RunSummary::from_records(records);
        for record in records {
            let outcome = if record.succeeded() { "succeeded" } else { "fallback" };
            metrics::counter!("scos_components_total", "outcome" => outcome).increment(1);
        }

        let outcome = merge(manifest, records, &self.ctx.release_root);
        self.state.save_final_mapping(&outcome.mapping).await?;
        info!("final summary: {}", summary.to_string().trim_end());

        if summary.succeeded == 0 {
            self.state.clear_release_command().await?;
            warn!("no component was rebuilt; not producing a release command");
            return Err(ScosError::NoSuccessfulBuilds { failed: summary.fallbacks() });
        }

        let command = build_release_command(
            &outcome.mapping,
            &self.ctx.base_release,
            &self.ctx.output_release,
            outcome.base_image_override.as_deref(),
        );
        self.state.save_release_command(&command).await?;

        let mut composed = false;
        if self.ctx.execute_compose {
            let prompt = format!("Compose {} from {}?", command.to_image, command.from_release);
            if self.collaborators.confirm.confirm(&prompt) {
                self.report(RunStage::Composing, None, 0, 1).await;
                self.collaborators.composer.compose(&command).await?;
                composed = true;
                self.report(RunStage::Composing, None, 1, 1).await;
                info!(image = %command.to_image, "release composed");
            } else {
                info!("composition skipped");
            }
        }

        Ok(RunReport { summary, mapping: outcome.mapping, command, composed })
    }
}
