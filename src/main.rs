//! slurm-pipeline - Main entry point
//!
//! Generates SLURM job scripts for multi-phase workloads and submits them in
//! dependency order via sbatch.

mod application;
mod apps;
mod builder;
mod cli;
mod command;
mod config;
mod error;
mod files;
mod job;
mod orchestrator;
mod resources;
mod scheduler;
mod script;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::apps::SolverApp;
use crate::cli::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::files::WorkDir;
use crate::orchestrator::PipelineDriver;
use crate::scheduler::SlurmClient;

/// Initialize tracing with RUST_LOG override support
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse_args();
    match cli.command {
        Commands::Validate { config } => {
            let config = PipelineConfig::load_def(&config)?;
            match config.validate_required_params() {
                Ok(()) => println!("✓ Pipeline definition is valid"),
                Err(e) => {
                    eprintln!("✗ Pipeline definition is invalid: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Generate {
            config,
            workdir,
            executable,
        } => {
            let mut driver = build_driver(&config, &workdir, executable)?;
            driver.generate_all().context("script generation failed")?;
            print!("{}", driver.summary());
        }
        Commands::Submit {
            config,
            workdir,
            executable,
            dry_run,
        } => {
            let mut driver = build_driver(&config, &workdir, executable)?;
            driver.generate_all().context("script generation failed")?;
            driver.validate().context("pipeline validation failed")?;
            print!("{}", driver.summary());

            let records = driver.submit(dry_run).context("pipeline submission failed")?;
            for (job_name, id) in &records {
                println!("  {} -> {}", job_name, id.as_str());
            }

            if !dry_run {
                println!("\nJob status:");
                for (job_name, status) in driver.query_status() {
                    println!("  {}: {}", job_name, status);
                }
            }
        }
    }

    Ok(())
}

/// Assemble the driver: parse the definition, set up the working directory,
/// wire the applications to the real scheduler boundary
fn build_driver(config_path: &Path, workdir: &Path, executable: PathBuf) -> Result<PipelineDriver> {
    let config = PipelineConfig::load_def(config_path)?;
    config.validate_required_params()?;

    let basename = config
        .common
        .get("basename")
        .cloned()
        .unwrap_or_else(|| "pipeline".to_string());
    info!(workdir = %workdir.display(), basename = %basename, "setting up pipeline");

    let workdir = WorkDir::new(workdir, basename)?;
    let mut driver = PipelineDriver::new(Box::new(SlurmClient::new()));
    driver.add_application(Box::new(SolverApp::new(&config, workdir, executable)));
    Ok(driver)
}
