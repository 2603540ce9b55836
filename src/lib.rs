//! slurm-pipeline library
//!
//! Generates SLURM job scripts for multi-phase computational workloads and
//! orchestrates their submission, respecting inter-job dependencies.

pub mod application;
pub mod apps;
pub mod builder;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod files;
pub mod job;
pub mod orchestrator;
pub mod resources;
pub mod scheduler;
pub mod script;

// Re-export main types for convenience
pub use application::Application;
pub use apps::SolverApp;
pub use builder::{dependency_expression, JobBuilder, JobSpec};
pub use command::CommandBuilder;
pub use config::{PipelineConfig, Section};
pub use error::{PipelineError, Result};
pub use files::WorkDir;
pub use job::{ArrayRange, JobDescriptor, JobKind};
pub use orchestrator::{JobStatus, PipelineDriver, SessionState, SubmittedId};
pub use resources::{GpuProfile, GpuType, ResourceConfig};
pub use scheduler::{SchedulerClient, SlurmClient};
pub use script::{render_directives, render_script, DirectiveSet};
