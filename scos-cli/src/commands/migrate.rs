//! `scos migrate` command

use super::prompt::StdinConfirm;
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use scos_core::adapters::{AutoConfirm, Collaborators, Confirm};
use scos_core::{load_manifest, Config, Pipeline, RunReport, RunStage, ScosError, StateManager};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Run the full migration for the manifest at `manifest_path`.
pub async fn migrate(config: Config, manifest_path: &Path) -> Result<()> {
    let manifest = load_manifest(manifest_path)
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

    println!(
        "{} Migrating {} component(s) from {}",
        "→".cyan().bold(),
        manifest.len(),
        manifest_path.display().to_string().dimmed()
    );

    let pb = ProgressBar::new(manifest.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {prefix:>8} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=>-"),
    );

    let confirm: Arc<dyn Confirm> = if config.auto_confirm {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(StdinConfirm::new(Some(pb.clone())))
    };
    let collaborators = Collaborators::from_config(&config, confirm);

    let ctx = config.into_context().context("Invalid configuration")?;
    let state = StateManager::new(ctx.db_path())
        .await
        .with_context(|| format!("Failed to open state database {}", ctx.db_path().display()))?;
    tracing::debug!(work_dir = %ctx.work_dir.display(), registry = %ctx.registry, "run context ready");

    let (tx, mut rx) = mpsc::channel(32);
    let pipeline = Pipeline::new(ctx, collaborators, state).with_progress(tx);

    let bar = pb.clone();
    let reporter = tokio::spawn(async move {
        let mut stage = None;
        while let Some(update) = rx.recv().await {
            if stage != Some(update.stage) {
                stage = Some(update.stage);
                bar.set_length(update.total as u64);
                bar.set_prefix(stage_label(update.stage));
            }
            bar.set_position(update.done as u64);
            bar.set_message(update.message);
        }
    });

    let result = pipeline.run(&manifest).await;
    drop(pipeline);
    let _ = reporter.await;
    pb.finish_and_clear();

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(ScosError::Aborted { stage }) => {
            println!("{} Aborted {}; state saved for resumption", "!".yellow().bold(), stage);
            Ok(())
        }
        Err(ScosError::NoSuccessfulBuilds { failed }) => {
            println!(
                "{} No component was rebuilt ({} fell back); no release command produced",
                "✗".red().bold(),
                failed
            );
            Err(ScosError::NoSuccessfulBuilds { failed }.into())
        }
        Err(e) => Err(e).context("Migration failed"),
    }
}

fn print_report(report: &RunReport) {
    println!("{} {}", "✓".green().bold(), report.summary.to_string().trim_end());
    println!();
    for entry in report.mapping.entries() {
        let marker = if entry.replaced { "rebuilt".green() } else { "original".dimmed() };
        println!("  {:<40} {:<9} {}", entry.component.as_str().bold(), marker, entry.image);
    }
    println!();
    if report.composed {
        println!("{} Release composed: {}", "✓".green().bold(), report.command.to_image.as_str().bold());
    } else {
        println!("{} Release command:", "→".cyan().bold());
        println!("{}", report.command);
    }
}

fn stage_label(stage: RunStage) -> &'static str {
    match stage {
        RunStage::Preparing => "prepare",
        RunStage::Building => "build",
        RunStage::Composing => "compose",
    }
}
