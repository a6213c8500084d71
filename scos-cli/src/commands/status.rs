//! `scos status` and `scos release-command`

use anyhow::{Context, Result};
use colored::Colorize;
use scos_core::{paths, ComponentRecord, Config, RunSummary, StateManager};
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "COMPONENT")]
    name: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "REF")]
    git_ref: String,
    #[tabled(rename = "REASON")]
    reason: String,
    #[tabled(rename = "IMAGE")]
    image: String,
}

impl From<&ComponentRecord> for ComponentRow {
    fn from(record: &ComponentRecord) -> Self {
        Self {
            name: record.name.clone(),
            status: record.status.to_string(),
            git_ref: record.resolved_ref.clone().unwrap_or_else(|| "-".to_string()),
            reason: record.failure_reason.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
            image: record.final_image().to_string(),
        }
    }
}

async fn open_state(config: &Config) -> Result<Option<StateManager>> {
    let db_path = paths::db_path(&PathBuf::from(&config.work_dir));
    if !db_path.exists() {
        println!("No migration state in {}", config.work_dir.as_str().dimmed());
        println!();
        println!("Start one with: {}", "scos migrate --manifest <file>".cyan());
        return Ok(None);
    }
    let state = StateManager::new(&db_path)
        .await
        .with_context(|| format!("Failed to open state database {}", db_path.display()))?;
    Ok(Some(state))
}

/// Show every component with its current status.
pub async fn status(config: &Config) -> Result<()> {
    let Some(state) = open_state(config).await? else {
        return Ok(());
    };

    let records = state.list_records().await.context("Failed to list components")?;
    if records.is_empty() {
        println!("No components recorded");
        return Ok(());
    }

    let rows: Vec<ComponentRow> = records.iter().map(ComponentRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);

    let summary = RunSummary::from_records(&records);
    println!();
    print!("{}", summary);
    if records.iter().any(|r| !r.is_terminal()) {
        println!("{}", "Run `scos migrate` again to resume unfinished components.".dimmed());
    }

    Ok(())
}

/// Print the stored release command as a shell line.
pub async fn release_command(config: &Config) -> Result<()> {
    let Some(state) = open_state(config).await? else {
        return Ok(());
    };

    match state.load_release_command().await.context("Failed to load release command")? {
        Some(command) => println!("{}", command),
        None => println!("No release command recorded (no successful run yet)"),
    }
    Ok(())
}
