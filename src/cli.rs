use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// slurm-pipeline - generate and submit dependency-ordered SLURM pipelines
#[derive(Parser)]
#[command(name = "slurm-pipeline")]
#[command(about = "Generate SLURM scripts for multi-phase workloads and submit them in dependency order")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate job scripts without submitting anything
    Generate {
        /// Path to the pipeline definition (.def) file
        config: PathBuf,

        /// Working directory for scripts and logs
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,

        /// Path to the solver executable
        #[arg(long, default_value = "solver")]
        executable: PathBuf,
    },
    /// Validate a pipeline definition file
    Validate {
        /// Path to the pipeline definition (.def) file
        config: PathBuf,
    },
    /// Generate, validate, and submit the pipeline
    Submit {
        /// Path to the pipeline definition (.def) file
        config: PathBuf,

        /// Working directory for scripts and logs
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,

        /// Path to the solver executable
        #[arg(long, default_value = "solver")]
        executable: PathBuf,

        /// Dry-run mode: invoke sbatch with --test-only and record
        /// simulated job IDs instead of real ones
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
