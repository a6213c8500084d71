//! Recipe discovery and transformation.

use super::transform;
use crate::error::Result;
use crate::types::{ComponentRecord, ComponentStatus, FailureReason};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};

/// Well-known recipe locations, relative to the source root, in priority order.
pub const RECIPE_CANDIDATES: [&str; 6] = [
    "Dockerfile",
    "Dockerfile.rhel",
    "Dockerfile.rhel9",
    "openshift/Dockerfile",
    "build/Dockerfile",
    "images/Dockerfile",
];

/// File-name prefix for the tree-wide fallback search.
const RECIPE_PREFIX: &str = "Dockerfile";

/// Find the recipe to build, relative to `root`.
///
/// Well-known locations win; otherwise the most recently modified file whose
/// name starts with `Dockerfile`, ties broken by the lexicographically
/// smallest path.
pub fn find_recipe(root: &Path) -> Option<PathBuf> {
    if let Some(candidate) = RECIPE_CANDIDATES.iter().find(|c| is_regular_file(&root.join(c))) {
        return Some(PathBuf::from(candidate));
    }

    let mut found = Vec::new();
    collect_recipes(root, root, &mut found);
    found.sort_by(|(a_path, a_time), (b_path, b_time)| {
        Reverse(a_time).cmp(&Reverse(b_time)).then_with(|| a_path.cmp(b_path))
    });
    found.into_iter().next().map(|(path, _)| path)
}

/// True for a regular file; symlinks are not followed.
fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path).map(|m| m.file_type().is_file()).unwrap_or(false)
}

fn collect_recipes(root: &Path, dir: &Path, found: &mut Vec<(PathBuf, SystemTime)>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("skipping {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else { continue };
        let path = entry.path();
        if file_type.is_dir() {
            if entry.file_name() != ".git" {
                collect_recipes(root, &path, found);
            }
        } else if file_type.is_file()
            && entry.file_name().to_string_lossy().starts_with(RECIPE_PREFIX)
        {
            let modified =
                entry.metadata().and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
            if let Ok(relative) = path.strip_prefix(root) {
                found.push((relative.to_path_buf(), modified));
            }
        }
    }
}

/// Locate and rewrite the recipe of a `Fetched` record cloned at `source_root`.
#[instrument(skip_all, fields(component = %record.name))]
pub fn locate(record: &mut ComponentRecord, source_root: &Path) -> Result<()> {
    record.require(ComponentStatus::Fetched)?;

    let Some(relative) = find_recipe(source_root) else {
        warn!("no recipe found under {}", source_root.display());
        metrics::counter!("scos_stage_failures_total", "reason" => "no_dockerfile").increment(1);
        return record.fail(FailureReason::NoDockerfile, "");
    };

    let rewrites = match transform::transform_file(&source_root.join(&relative)) {
        Ok(rewrites) => rewrites,
        Err(e) => {
            warn!("recipe {} unusable: {}", relative.display(), e);
            return record.fail(FailureReason::NoDockerfile, e.to_string());
        }
    };

    if rewrites.is_empty() {
        info!(recipe = %relative.display(), "recipe has no rewritable base image; building as is");
    } else {
        for rewrite in &rewrites {
            info!(line = rewrite.line, "{} -> {}", rewrite.before.trim(), rewrite.after.trim());
        }
    }

    record.dockerfile_path = Some(relative);
    record.rewritten_lines = Some(rewrites.len());
    record.advance(ComponentStatus::Buildable)
}
