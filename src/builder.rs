//! Job descriptor construction.
//!
//! One builder per working directory. Each per-kind operation resolves base
//! directives from the resource configuration, computes log path templates,
//! applies GPU overrides where they belong, renders the script, and writes it
//! executable. All validation happens before anything touches the filesystem.

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::files::WorkDir;
use crate::job::{ArrayRange, JobDescriptor, JobKind};
use crate::resources::ResourceConfig;
use crate::script::{render_script, DirectiveSet};

/// Build the scheduler-native dependency expression for a set of references.
/// References are either placeholders (pre-submission) or resolved job IDs.
pub fn dependency_expression(refs: &[String]) -> String {
    format!("afterok:{}", refs.join(":"))
}

/// Inputs common to every job kind
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Process-unique job name, also the script filename stem
    pub name: String,
    /// `[slurm]` key naming this job's memory requirement
    pub memory_key: String,
    /// Optional `[slurm]` key naming this job's walltime
    pub walltime_key: Option<String>,
    /// Command argument vector
    pub command: Vec<String>,
    /// Opaque environment-setup block placed between directives and command
    pub environment_setup: String,
    /// Logical names of prerequisite jobs (resolved at submission time)
    pub depends_on: Vec<String>,
    /// Pre-submission dependency reference embedded in the script, if any.
    /// Usually a placeholder; the real ID is passed via `--dependency` at
    /// submission.
    pub dependency_ref: Option<String>,
    /// Application phase tag
    pub phase: Option<String>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, memory_key: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            memory_key: memory_key.into(),
            walltime_key: None,
            command,
            environment_setup: String::new(),
            depends_on: Vec::new(),
            dependency_ref: None,
            phase: None,
        }
    }

    pub fn walltime_key(mut self, key: impl Into<String>) -> Self {
        self.walltime_key = Some(key.into());
        self
    }

    pub fn depends_on(mut self, job_name: impl Into<String>) -> Self {
        self.depends_on.push(job_name.into());
        self
    }

    pub fn dependency_ref(mut self, reference: impl Into<String>) -> Self {
        self.dependency_ref = Some(reference.into());
        self
    }

    pub fn environment_setup(mut self, block: impl Into<String>) -> Self {
        self.environment_setup = block.into();
        self
    }

    pub fn phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }
}

/// Builds job descriptors and writes their scripts
#[derive(Debug)]
pub struct JobBuilder<'a> {
    resources: &'a ResourceConfig,
    workdir: &'a WorkDir,
}

impl<'a> JobBuilder<'a> {
    pub fn new(resources: &'a ResourceConfig, workdir: &'a WorkDir) -> Self {
        Self { resources, workdir }
    }

    /// Generate a single (non-array, non-GPU) job
    pub fn single(&self, spec: JobSpec) -> Result<JobDescriptor> {
        let directives = self.base_directives(&spec, false)?;
        self.finish(spec, JobKind::Single, directives, None, None, 0)
    }

    /// Generate an array job over an inclusive task range
    pub fn array(&self, spec: JobSpec, range: ArrayRange) -> Result<JobDescriptor> {
        let mut directives = self.base_directives(&spec, true)?;
        directives.array = Some(range.to_string());
        self.finish(spec, JobKind::Array, directives, Some(range), None, 0)
    }

    /// Generate a GPU job
    pub fn gpu(&self, spec: JobSpec, gpu_count: u32) -> Result<JobDescriptor> {
        let mut directives = self.base_directives(&spec, false)?;
        let gpu_type = self.apply_gpu_overrides(&spec, &mut directives, gpu_count)?;
        self.finish(spec, JobKind::Gpu, directives, None, Some(gpu_type), gpu_count)
    }

    /// Generate a GPU array job
    pub fn gpu_array(&self, spec: JobSpec, range: ArrayRange, gpu_count: u32) -> Result<JobDescriptor> {
        let mut directives = self.base_directives(&spec, true)?;
        let gpu_type = self.apply_gpu_overrides(&spec, &mut directives, gpu_count)?;
        directives.array = Some(range.to_string());
        self.finish(
            spec,
            JobKind::GpuArray,
            directives,
            Some(range),
            Some(gpu_type),
            gpu_count,
        )
    }

    /// Resolve the base directive set shared by every kind. Fails before any
    /// file is written when required configuration is absent.
    fn base_directives(&self, spec: &JobSpec, array_job: bool) -> Result<DirectiveSet> {
        let base = self.resources.base_directives();
        let account = base.get("account").cloned().unwrap_or_default();
        let email = base.get("email").cloned().unwrap_or_default();

        let mut missing = Vec::new();
        if account.is_empty() {
            missing.push("account");
        }
        if email.is_empty() {
            missing.push("email");
        }
        if !missing.is_empty() {
            return Err(PipelineError::config(format!(
                "{}: missing required [slurm] parameters: {:?}",
                spec.name, missing
            )));
        }

        let (output, error) = self.workdir.log_paths(&spec.name, array_job);

        Ok(DirectiveSet {
            export: base.get("export").cloned(),
            chdir: Some(self.workdir.path().display().to_string()),
            time: Some(self.resources.walltime(spec.walltime_key.as_deref())),
            mem: Some(self.resources.memory(&spec.memory_key)),
            nodes: base.get("nodes").cloned(),
            ntasks_per_node: base.get("ntasks_per_node").cloned(),
            output: Some(output),
            error: Some(error),
            job_name: Some(spec.name.clone()),
            account: Some(account),
            mail_user: Some(email),
            mail_type: Some("FAIL".to_string()),
            ..Default::default()
        })
    }

    /// GPU kinds get a hardware constraint, a gres request, and a memory
    /// override when the caller did not configure the memory key explicitly.
    fn apply_gpu_overrides(
        &self,
        spec: &JobSpec,
        directives: &mut DirectiveSet,
        gpu_count: u32,
    ) -> Result<crate::resources::GpuType> {
        let designator = self
            .resources
            .get("gpu_type")
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "{}: GPU job requires 'gpu_type' in [slurm] configuration",
                    spec.name
                ))
            })?;

        let gpu_type: crate::resources::GpuType = designator.parse().map_err(|_| {
            PipelineError::config(format!(
                "{}: unsupported GPU type '{}'",
                spec.name, designator
            ))
        })?;
        let profile = gpu_type.profile();

        directives.constraint = Some(profile.constraint.to_string());
        directives.gres = Some(format!("gpu:{}", gpu_count));
        if !self.resources.has_memory_key(&spec.memory_key) {
            directives.mem = Some(profile.cpu_mem_per_gpu.to_string());
        }

        Ok(gpu_type)
    }

    /// Attach the dependency expression, render, write, and assemble the
    /// descriptor
    fn finish(
        &self,
        spec: JobSpec,
        kind: JobKind,
        mut directives: DirectiveSet,
        array_range: Option<ArrayRange>,
        gpu_type: Option<crate::resources::GpuType>,
        gpu_count: u32,
    ) -> Result<JobDescriptor> {
        if let Some(ref reference) = spec.dependency_ref {
            directives.dependency = Some(dependency_expression(std::slice::from_ref(reference)));
        }

        let script_content = render_script(&directives, &spec.command, &spec.environment_setup);
        let script_filename = format!("{}.sh", spec.name);
        let script_path = self.workdir.write_script(&script_content, &script_filename)?;

        let descriptor = JobDescriptor {
            name: spec.name,
            kind,
            directives,
            array_range,
            gpu_type,
            gpu_count,
            command: spec.command,
            depends_on: spec.depends_on,
            script_path,
            phase: spec.phase,
        };
        descriptor.validate()?;

        info!(job = %descriptor.name, kind = %descriptor.kind, "generated job script");
        Ok(descriptor)
    }
}
