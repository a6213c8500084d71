use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scos_core::Config;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "scos")]
#[command(about = "Rebuild release components on SCOS and compose a derived release", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "SCOS_CONFIG")]
    config: Option<PathBuf>,

    /// Working directory holding sources and the state database
    #[arg(long, global = true, env = "SCOS_WORK_DIR")]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration pipeline for a manifest
    Migrate {
        /// Manifest file (component name to image reference)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Registry namespace rebuilt images are pushed to
        #[arg(long)]
        registry: Option<String>,

        /// Release the composition starts from
        #[arg(long)]
        base_release: Option<String>,

        /// Reference the composed release is pushed to
        #[arg(short, long)]
        output: Option<String>,

        /// Answer yes to every confirmation
        #[arg(short, long)]
        yes: bool,

        /// Execute the release composition after a successful run
        #[arg(long)]
        execute: bool,

        /// Ask before continuing after a failed build
        #[arg(long)]
        stop_on_failure: bool,
    },

    /// Show the state of every component
    Status,

    /// Print the stored release composition command
    ReleaseCommand,

    /// Show (or apply) the base-image rewrite for a recipe
    Transform {
        /// Recipe file
        dockerfile: PathBuf,

        /// Rewrite the file in place
        #[arg(short, long)]
        write: bool,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(dir) = &cli.work_dir {
        config.work_dir = dir.to_string_lossy().to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    scos_core::init_observability(&config.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::Migrate {
            manifest,
            registry,
            base_release,
            output,
            yes,
            execute,
            stop_on_failure,
        } => {
            if let Some(registry) = registry {
                config.target_registry = registry;
            }
            if let Some(base) = base_release {
                config.base_release = base;
            }
            if let Some(output) = output {
                config.output_release = output;
            }
            config.auto_confirm |= yes;
            config.execute_compose |= execute;
            if stop_on_failure {
                config.continue_on_failure = false;
            }

            commands::migrate(config, &manifest).await?;
        }

        Commands::Status => {
            commands::status(&config).await?;
        }

        Commands::ReleaseCommand => {
            commands::release_command(&config).await?;
        }

        Commands::Transform { dockerfile, write } => {
            commands::transform(&dockerfile, write)?;
        }
    }

    Ok(())
}
