//! Image inspection through `skopeo inspect`.

use super::{process, ImageInfo, ImageInspector};
use crate::error::{Result, ScosError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

/// Inspects remote images without pulling them.
#[derive(Debug, Clone)]
pub struct SkopeoInspector {
    binary: String,
    timeout: Duration,
}

impl SkopeoInspector {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }
}

#[async_trait]
impl ImageInspector for SkopeoInspector {
    #[instrument(skip(self), fields(image = %image_ref))]
    async fn inspect(&self, image_ref: &str) -> Result<ImageInfo> {
        let transport = format!("docker://{}", image_ref);
        let output =
            process::run(&self.binary, ["inspect", "--no-tags", transport.as_str()], self.timeout)
                .await?;
        parse_inspect_output(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SkopeoOutput {
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

/// Parse `skopeo inspect` JSON. `Labels` is `null` for unlabelled images.
fn parse_inspect_output(stdout: &[u8]) -> Result<ImageInfo> {
    let parsed: SkopeoOutput = serde_json::from_slice(stdout).map_err(|e| {
        ScosError::collaborator("skopeo", format!("unparseable inspect output: {}", e))
    })?;

    Ok(ImageInfo {
        labels: parsed.labels.unwrap_or_default(),
        digest: parsed.digest.unwrap_or_default(),
    })
}
