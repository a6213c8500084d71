//! Release composition through `oc adm release new`.

use super::{process, ReleaseComposer};
use crate::error::Result;
use crate::pipeline::release::ReleaseCommand;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct OcComposer {
    binary: String,
    timeout: Duration,
}

impl OcComposer {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }
}

#[async_trait]
impl ReleaseComposer for OcComposer {
    #[instrument(skip_all, fields(to_image = %command.to_image))]
    async fn compose(&self, command: &ReleaseCommand) -> Result<()> {
        info!(components = command.mappings.len(), "composing release");
        process::run(&self.binary, command.to_args(), self.timeout).await?;
        info!("release composed");
        Ok(())
    }
}
