//! Build execution: build, push and digest capture for a `Buildable` record.

use crate::adapters::{BuildRequest, ImageBuilder, ImageInspector};
use crate::config::RunContext;
use crate::error::{Result, ScosError};
use crate::types::{ComponentRecord, ComponentStatus, FailureReason};
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Tag used for the moving alias pushed next to the revision tag.
pub const LATEST_TAG: &str = "latest";

/// Tags a build produces: `<repo>:<revision>` then `<repo>:latest`.
pub fn image_tags(ctx: &RunContext, record: &ComponentRecord) -> Vec<String> {
    let repository = ctx.image_repository(&record.name);
    let revision = record.revision.as_deref().unwrap_or(LATEST_TAG);
    vec![format!("{}:{}", repository, revision), format!("{}:{}", repository, LATEST_TAG)]
}

/// Build request for a record whose source lives at `source_root`.
pub fn build_request(
    ctx: &RunContext,
    record: &ComponentRecord,
    source_root: &Path,
) -> Result<BuildRequest> {
    let relative = record.dockerfile_path.as_ref().ok_or_else(|| {
        ScosError::Internal(format!("{} is buildable without a recipe path", record.name))
    })?;
    let recipe = source_root.join(relative);
    let context_dir = recipe.parent().unwrap_or(source_root).to_path_buf();

    Ok(BuildRequest {
        recipe,
        context_dir,
        tags: image_tags(ctx, record),
        build_args: vec![ctx.build_arg.clone()],
    })
}

fn record_failure(record: &mut ComponentRecord, reason: FailureReason, err: &ScosError) -> Result<()> {
    warn!("{}: {}", reason, err);
    metrics::counter!("scos_stage_failures_total", "reason" => reason.code()).increment(1);
    record.fail(reason, err.to_string())
}

/// Build, push and resolve the replacement image for one record.
///
/// Every step is a single attempt; the first failure is terminal for the
/// record and is reported through its status, not the returned error.
#[instrument(skip_all, fields(component = %record.name))]
pub async fn build(
    ctx: &RunContext,
    builder: &dyn ImageBuilder,
    inspector: &dyn ImageInspector,
    record: &mut ComponentRecord,
    source_root: &Path,
) -> Result<()> {
    record.require(ComponentStatus::Buildable)?;

    let request = build_request(ctx, record, source_root)?;
    let started = Instant::now();

    info!(recipe = %request.recipe.display(), tag = %request.tags[0], "building");
    if let Err(e) = builder.build(&request).await {
        return record_failure(record, FailureReason::BuildFailed, &e);
    }
    metrics::histogram!("scos_build_duration_seconds").record(started.elapsed().as_secs_f64());

    for tag in &request.tags {
        if let Err(e) = builder.push(tag).await {
            return record_failure(record, FailureReason::PushFailed, &e);
        }
    }

    let primary = &request.tags[0];
    let digest = match inspector.inspect(primary).await {
        Ok(info) => info.digest.trim().to_string(),
        Err(e) => {
            warn!("could not inspect pushed image {}: {}", primary, e);
            String::new()
        }
    };
    if digest.is_empty() || digest == "null" {
        metrics::counter!("scos_stage_failures_total", "reason" => "no_digest").increment(1);
        return record.fail(FailureReason::NoDigest, format!("no digest reported for {}", primary));
    }

    let replacement = format!("{}@{}", ctx.image_repository(&record.name), digest);
    info!(image = %replacement, "rebuilt");
    record.succeed(replacement)
}
