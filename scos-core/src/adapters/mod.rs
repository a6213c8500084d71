//! Collaborator abstractions.
//!
//! The pipeline never talks to registries, git or a container engine
//! directly. It goes through these traits:
//! - [`ImageInspector`]: image labels and content digest (skopeo)
//! - [`SourceCloner`]: shallow clone at a ref (git)
//! - [`ImageBuilder`]: build and push (podman)
//! - [`ReleaseComposer`]: release composition (oc)
//! - [`Confirm`]: operator confirmation
//!
//! Every call is a single attempt. Implementations bound each call with a
//! timeout and report it as an ordinary failure.

use crate::error::Result;
use crate::pipeline::release::ReleaseCommand;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod git;
pub mod oc;
pub mod podman;
pub mod process;
pub mod skopeo;

pub use git::GitCloner;
pub use oc::OcComposer;
pub use podman::PodmanBuilder;
pub use skopeo::SkopeoInspector;

/// Result of inspecting an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInfo {
    pub labels: HashMap<String, String>,
    /// Content digest (`sha256:...`); empty when the registry reported none.
    pub digest: String,
}

/// Result of cloning a source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutput {
    /// Concrete commit the checkout landed on.
    pub revision: String,
}

/// Everything needed to run one image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub recipe: PathBuf,
    pub context_dir: PathBuf,
    /// First tag is the primary (revision) tag.
    pub tags: Vec<String>,
    pub build_args: Vec<(String, String)>,
}

#[async_trait]
pub trait ImageInspector: Send + Sync {
    async fn inspect(&self, image_ref: &str) -> Result<ImageInfo>;
}

#[async_trait]
pub trait SourceCloner: Send + Sync {
    /// Clone `url` at `git_ref` into `dest`, replacing anything already there.
    async fn clone_source(&self, url: &str, git_ref: &str, dest: &Path) -> Result<CloneOutput>;
}

#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<()>;

    async fn push(&self, tag: &str) -> Result<()>;
}

#[async_trait]
pub trait ReleaseComposer: Send + Sync {
    async fn compose(&self, command: &ReleaseCommand) -> Result<()>;
}

/// Operator confirmation capability.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Fixed answer for non-interactive runs.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(answer = self.0, "auto-confirm: {}", prompt);
        self.0
    }
}

/// The full set of collaborators a pipeline run uses.
#[derive(Clone)]
pub struct Collaborators {
    pub inspector: Arc<dyn ImageInspector>,
    pub cloner: Arc<dyn SourceCloner>,
    pub builder: Arc<dyn ImageBuilder>,
    pub composer: Arc<dyn ReleaseComposer>,
    pub confirm: Arc<dyn Confirm>,
}

impl Collaborators {
    /// Process-backed collaborators configured from `config`.
    pub fn from_config(config: &crate::config::Config, confirm: Arc<dyn Confirm>) -> Self {
        let timeout = config.collaborator_timeout();
        Self {
            inspector: Arc::new(SkopeoInspector::new(&config.tools.skopeo, timeout)),
            cloner: Arc::new(GitCloner::new(&config.tools.git, timeout)),
            builder: Arc::new(PodmanBuilder::new(&config.tools.podman, timeout)),
            composer: Arc::new(OcComposer::new(&config.tools.oc, timeout)),
            confirm,
        }
    }
}
