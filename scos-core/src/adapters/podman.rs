//! Image build and push through `podman`.

use super::{process, BuildRequest, ImageBuilder};
use crate::error::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct PodmanBuilder {
    binary: String,
    timeout: Duration,
}

impl PodmanBuilder {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }
}

/// Argument vector for `podman build`.
pub fn build_args(request: &BuildRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["build".into(), "-f".into(), request.recipe.clone().into()];
    for (key, value) in &request.build_args {
        args.push("--build-arg".into());
        args.push(format!("{}={}", key, value).into());
    }
    for tag in &request.tags {
        args.push("-t".into());
        args.push(tag.into());
    }
    args.push(request.context_dir.clone().into());
    args
}

#[async_trait]
impl ImageBuilder for PodmanBuilder {
    #[instrument(skip_all, fields(recipe = %request.recipe.display()))]
    async fn build(&self, request: &BuildRequest) -> Result<()> {
        process::run(&self.binary, build_args(request), self.timeout).await?;
        info!(tags = ?request.tags, "image built");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn push(&self, tag: &str) -> Result<()> {
        process::run(&self.binary, ["push", tag], self.timeout).await?;
        info!("image pushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_args() {
        let request = BuildRequest {
            recipe: PathBuf::from("/w/sources/cli/images/cli/Dockerfile.rhel"),
            context_dir: PathBuf::from("/w/sources/cli/images/cli"),
            tags: vec!["reg2/cli:abc123".into(), "reg2/cli:latest".into()],
            build_args: vec![("TAGS".into(), "scos".into())],
        };

        let args: Vec<String> =
            build_args(&request).into_iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "build",
                "-f",
                "/w/sources/cli/images/cli/Dockerfile.rhel",
                "--build-arg",
                "TAGS=scos",
                "-t",
                "reg2/cli:abc123",
                "-t",
                "reg2/cli:latest",
                "/w/sources/cli/images/cli",
            ]
        );
    }
}
