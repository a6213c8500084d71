//! Source checkout through the `git` CLI.

use super::{process, CloneOutput, SourceCloner};
use crate::error::{Result, ScosError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Shallow-clones a single ref.
#[derive(Debug, Clone)]
pub struct GitCloner {
    binary: String,
    timeout: Duration,
}

impl GitCloner {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }
}

#[async_trait]
impl SourceCloner for GitCloner {
    #[instrument(skip_all, fields(url = %url, git_ref = %git_ref))]
    async fn clone_source(&self, url: &str, git_ref: &str, dest: &Path) -> Result<CloneOutput> {
        clear_destination(dest).await?;

        let dest_str = dest.to_string_lossy();
        process::run(
            &self.binary,
            ["clone", "--quiet", "--depth", "1", "--branch", git_ref, url, &*dest_str],
            self.timeout,
        )
        .await?;

        let output =
            process::run(&self.binary, ["-C", &*dest_str, "rev-parse", "HEAD"], self.timeout)
                .await?;
        let revision = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if revision.is_empty() {
            return Err(ScosError::collaborator("git", "rev-parse returned no revision"));
        }

        info!(revision = %revision, "cloned");
        Ok(CloneOutput { revision })
    }
}

/// Remove a previous checkout so each attempt starts from an empty directory.
async fn clear_destination(dest: &Path) -> Result<()> {
    if tokio::fs::try_exists(dest).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(dest)
            .await
            .map_err(|e| ScosError::IoError { path: dest.to_path_buf(), source: e })?;
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ScosError::IoError { path: parent.to_path_buf(), source: e })?;
    }
    Ok(())
}
