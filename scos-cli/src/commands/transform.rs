//! `scos transform` command

use anyhow::{Context, Result};
use colored::Colorize;
use scos_core::pipeline::transform as rewrite;
use std::path::Path;

/// Show the base-image rewrites for `path`, applying them when `write` is set.
pub fn transform(path: &Path, write: bool) -> Result<()> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (_, rewrites) = rewrite::transform(&content);

    if rewrites.is_empty() {
        println!("{} No rewritable base image in {}", "•".dimmed(), path.display());
        return Ok(());
    }

    for change in &rewrites {
        println!("{} line {} ({})", "→".cyan().bold(), change.line, change.rule.as_str().dimmed());
        println!("  {} {}", "-".red(), change.before.trim_end());
        println!("  {} {}", "+".green(), change.after.trim_end());
    }

    if write {
        rewrite::transform_file(path)
            .with_context(|| format!("Failed to rewrite {}", path.display()))?;
        println!("{} Rewrote {} line(s) in {}", "✓".green().bold(), rewrites.len(), path.display());
    }
    Ok(())
}
