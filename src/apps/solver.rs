//! Two-phase solver application.
//!
//! Phase "plan" is a single job that lays out the cache; phase "fill" is an
//! array job that populates it in parallel, one task per chunk, and depends
//! on the plan job completing successfully. Parameters come from the
//! `[solver]` config section plus the shared `[common]` section.

use std::path::{Path, PathBuf};

use crate::application::Application;
use crate::builder::{JobBuilder, JobSpec};
use crate::command::CommandBuilder;
use crate::config::{PipelineConfig, Section};
use crate::error::{PipelineError, Result};
use crate::files::WorkDir;
use crate::job::{ArrayRange, JobDescriptor};
use crate::resources::ResourceConfig;

/// Default worker count when `solver_nprocs` is absent (validation requires
/// it, so this only matters for partially-validated sessions)
const DEFAULT_NPROCS: u32 = 40;

pub struct SolverApp {
    common: Section,
    slurm: Section,
    params: Section,
    resources: ResourceConfig,
    workdir: WorkDir,
    executable: PathBuf,
}

impl SolverApp {
    pub fn new(config: &PipelineConfig, workdir: WorkDir, executable: impl Into<PathBuf>) -> Self {
        Self {
            common: config.common.clone(),
            slurm: config.slurm.clone(),
            params: config.app_params("solver"),
            resources: ResourceConfig::new(config.slurm.clone()),
            workdir,
            executable: executable.into(),
        }
    }

    fn basename(&self) -> &str {
        self.common
            .get("basename")
            .map(String::as_str)
            .unwrap_or("pipeline")
    }

    fn nprocs(&self) -> u32 {
        self.slurm
            .get("solver_nprocs")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_NPROCS)
    }

    /// Absolute path of the cache directory the solver writes into
    fn cache_path(&self) -> PathBuf {
        let name = self
            .params
            .get("cache")
            .map(String::as_str)
            .unwrap_or("ps.cf");
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.path().join(name)
        }
    }

    /// One command builder shared by both phases
    fn command_builder(&self) -> CommandBuilder {
        let mut builder = CommandBuilder::new();
        builder
            .executable(self.executable.display().to_string())
            .base_arg("help", "noprompt");

        // Common parameters, minus the pipeline-internal ones
        for (key, value) in &self.common {
            if key != "basename" && key != "iterations" {
                builder.base_arg(key.as_str(), value.as_str());
            }
        }
        for (key, value) in &self.params {
            builder.base_arg(key.as_str(), value.as_str());
        }

        let cache = self.cache_path().display().to_string();
        builder.mode_arg("plan", "cache", cache.clone());
        builder.mode_arg("fill", "cache", cache);
        builder
    }
}

impl Application for SolverApp {
    fn name(&self) -> &str {
        "solver"
    }

    fn validate_requirements(&self) -> Result<()> {
        let mut missing = Vec::new();
        for key in ["vis", "basename"] {
            if !self.common.contains_key(key) {
                missing.push(format!("[common] {}", key));
            }
        }
        for key in ["account", "email", "solver_nprocs"] {
            if !self.slurm.contains_key(key) {
                missing.push(format!("[slurm] {}", key));
            }
        }
        if !missing.is_empty() {
            return Err(PipelineError::validation(format!(
                "solver: missing required parameters: {}",
                missing.join(", ")
            )));
        }

        if !self.executable.exists() {
            return Err(PipelineError::validation(format!(
                "solver: executable not found: {}",
                self.executable.display()
            )));
        }
        Ok(())
    }

    fn generate_jobs(&mut self) -> Result<Vec<JobDescriptor>> {
        let commands = self.command_builder();
        let builder = JobBuilder::new(&self.resources, &self.workdir);
        let basename = self.basename().to_string();

        let plan_name = format!("{}_solver_plan", basename);
        let plan = builder.single(
            JobSpec::new(plan_name.clone(), "solver_mem", commands.build(Some("plan"))?)
                .walltime_key("solver_walltime")
                .phase("plan"),
        )?;

        let fill_name = format!("{}_solver_fill", basename);
        let range = ArrayRange::new(0, self.nprocs().saturating_sub(1))?;
        let fill = builder.array(
            JobSpec::new(fill_name, "solver_mem", commands.build(Some("fill"))?)
                .walltime_key("solver_walltime")
                .depends_on(plan_name)
                .dependency_ref("$PLAN_JOB_ID")
                .phase("fill"),
            range,
        )?;

        Ok(vec![plan, fill])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;
    use std::fs;

    const DEF: &str = "\
[common]
vis = obs.ms
basename = run7
iterations = 2

[slurm]
account = acct1
email = user@example.edu
solver_nprocs = 8
solver_mem = 4GB
default_walltime = 3:00:00

[solver]
wplanes = 1
cache = run7.cf
";

    fn setup() -> (tempfile::TempDir, SolverApp) {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("solver");
        fs::write(&exe, "#!/bin/bash\n").unwrap();

        let config = PipelineConfig::parse_def(DEF).unwrap();
        let workdir = WorkDir::new(dir.path().join("out"), "run7").unwrap();
        let app = SolverApp::new(&config, workdir, &exe);
        (dir, app)
    }

    #[test]
    fn test_validate_requirements_ok() {
        let (_dir, app) = setup();
        app.validate_requirements().unwrap();
    }

    #[test]
    fn test_validate_requirements_missing_nprocs() {
        let (dir, _) = setup();
        let mut config = PipelineConfig::parse_def(DEF).unwrap();
        config.slurm.remove("solver_nprocs");
        let workdir = WorkDir::new(dir.path().join("out2"), "run7").unwrap();
        let app = SolverApp::new(&config, workdir, dir.path().join("solver"));

        let err = app.validate_requirements().unwrap_err();
        assert!(err.to_string().contains("solver_nprocs"));
    }

    #[test]
    fn test_validate_requirements_missing_executable() {
        let (dir, _) = setup();
        let config = PipelineConfig::parse_def(DEF).unwrap();
        let workdir = WorkDir::new(dir.path().join("out3"), "run7").unwrap();
        let app = SolverApp::new(&config, workdir, dir.path().join("no_such_binary"));

        let err = app.validate_requirements().unwrap_err();
        assert!(err.to_string().contains("executable not found"));
    }

    #[test]
    fn test_generates_plan_then_fill_with_dependency() {
        let (_dir, mut app) = setup();
        let jobs = app.generate_jobs().unwrap();
        assert_eq!(jobs.len(), 2);

        let plan = &jobs[0];
        assert_eq!(plan.name, "run7_solver_plan");
        assert_eq!(plan.kind, JobKind::Single);
        assert!(plan.depends_on.is_empty());
        assert_eq!(plan.phase.as_deref(), Some("plan"));

        let fill = &jobs[1];
        assert_eq!(fill.name, "run7_solver_fill");
        assert_eq!(fill.kind, JobKind::Array);
        assert_eq!(fill.array_range.unwrap().to_string(), "0-7");
        assert_eq!(fill.depends_on, vec!["run7_solver_plan".to_string()]);
    }

    #[test]
    fn test_command_carries_common_and_app_params() {
        let (_dir, mut app) = setup();
        let jobs = app.generate_jobs().unwrap();
        let command = jobs[0].command.join(" ");

        assert!(command.contains("help=noprompt"));
        assert!(command.contains("vis=obs.ms"));
        assert!(command.contains("wplanes=1"));
        // Pipeline-internal keys never reach the solver command line
        assert!(!command.contains("basename="));
        assert!(!command.contains("iterations="));
        // Relative cache name resolves under the working directory
        assert!(command.contains("out/run7.cf"));
    }

    #[test]
    fn test_scripts_written_to_workdir() {
        let (_dir, mut app) = setup();
        let jobs = app.generate_jobs().unwrap();
        for job in &jobs {
            assert!(job.script_path.exists(), "{:?} missing", job.script_path);
        }
        let fill_script = fs::read_to_string(&jobs[1].script_path).unwrap();
        assert!(fill_script.contains("#SBATCH --array=0-7"));
        assert!(fill_script.contains("#SBATCH --dependency=afterok:$PLAN_JOB_ID"));
    }
}
