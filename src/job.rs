//! Job descriptors: one unit of schedulable work.
//!
//! A `JobDescriptor` is produced by the builder, registered with the
//! orchestrator, and never mutated afterwards. Its name is the process-unique
//! key everything else (edges, submission records) hangs off.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};

use crate::error::{PipelineError, Result};
use crate::resources::GpuType;
use crate::script::DirectiveSet;

/// The four kinds of SLURM job this pipeline generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    Single,
    Array,
    Gpu,
    GpuArray,
}

impl JobKind {
    /// Array kinds carry a task range and per-task log paths
    pub fn is_array(self) -> bool {
        matches!(self, JobKind::Array | JobKind::GpuArray)
    }

    /// GPU kinds carry a constraint and a gres request
    pub fn is_gpu(self) -> bool {
        matches!(self, JobKind::Gpu | JobKind::GpuArray)
    }
}

/// Inclusive array task range, rendered as `lo-hi`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayRange {
    pub lo: u32,
    pub hi: u32,
}

impl ArrayRange {
    pub fn new(lo: u32, hi: u32) -> Result<Self> {
        if lo > hi {
            return Err(PipelineError::validation(format!(
                "array range {}-{} is empty (lo > hi)",
                lo, hi
            )));
        }
        Ok(Self { lo, hi })
    }

    pub fn len(&self) -> u32 {
        self.hi - self.lo + 1
    }

    pub fn is_empty(&self) -> bool {
        false // construction rejects lo > hi
    }
}

impl std::fmt::Display for ArrayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

/// One schedulable job: name, kind, rendered directives, command, and the
/// logical names of its prerequisites. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Process-unique job name, also used as the script filename stem
    pub name: String,
    pub kind: JobKind,
    pub directives: DirectiveSet,
    /// Present only for array kinds
    pub array_range: Option<ArrayRange>,
    /// GPU hardware type, present only for GPU kinds
    pub gpu_type: Option<GpuType>,
    /// GPUs requested per job/task, GPU kinds only
    pub gpu_count: u32,
    /// Command argument vector, space-joined in the script
    pub command: Vec<String>,
    /// Names of jobs that must complete successfully first
    pub depends_on: Vec<String>,
    /// Location of the written script
    pub script_path: PathBuf,
    /// Application phase tag, e.g. "plan" or "fill" (informational)
    pub phase: Option<String>,
}

impl JobDescriptor {
    /// Check the per-descriptor invariants. Registry-level invariants
    /// (name uniqueness) are the orchestrator's job.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::validation("job name must not be empty"));
        }
        if self.kind.is_array() && self.array_range.is_none() {
            return Err(PipelineError::validation(format!(
                "{}: array job requires an array range",
                self.name
            )));
        }
        if !self.kind.is_array() && self.array_range.is_some() {
            return Err(PipelineError::validation(format!(
                "{}: non-array job must not carry an array range",
                self.name
            )));
        }
        if self.kind.is_gpu() && self.gpu_type.is_none() {
            return Err(PipelineError::validation(format!(
                "{}: GPU job requires a GPU type",
                self.name
            )));
        }
        if self.command.is_empty() {
            return Err(PipelineError::validation(format!(
                "{}: job has no command",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(kind: JobKind) -> JobDescriptor {
        JobDescriptor {
            name: "base_plan".into(),
            kind,
            directives: DirectiveSet::default(),
            array_range: None,
            gpu_type: None,
            gpu_count: 0,
            command: vec!["solver".into()],
            depends_on: vec![],
            script_path: PathBuf::from("base_plan.sh"),
            phase: None,
        }
    }

    #[test]
    fn test_array_range_rejects_inverted_bounds() {
        assert!(ArrayRange::new(5, 3).is_err());
        let range = ArrayRange::new(0, 7).unwrap();
        assert_eq!(range.to_string(), "0-7");
        assert_eq!(range.len(), 8);
    }

    #[test]
    fn test_array_range_single_task() {
        let range = ArrayRange::new(4, 4).unwrap();
        assert_eq!(range.to_string(), "4-4");
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn test_kind_flags() {
        assert!(JobKind::Array.is_array());
        assert!(JobKind::GpuArray.is_array());
        assert!(JobKind::GpuArray.is_gpu());
        assert!(!JobKind::Single.is_array());
        assert!(!JobKind::Array.is_gpu());
    }

    #[test]
    fn test_array_job_requires_range() {
        let mut job = descriptor(JobKind::Array);
        assert!(job.validate().is_err());
        job.array_range = Some(ArrayRange::new(0, 3).unwrap());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_single_job_must_not_carry_range() {
        let mut job = descriptor(JobKind::Single);
        assert!(job.validate().is_ok());
        job.array_range = Some(ArrayRange::new(0, 3).unwrap());
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_gpu_job_requires_gpu_type() {
        let mut job = descriptor(JobKind::Gpu);
        assert!(job.validate().is_err());
        job.gpu_type = Some(GpuType::A100);
        job.gpu_count = 1;
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_empty_name_or_command_rejected() {
        let mut job = descriptor(JobKind::Single);
        job.name = "  ".into();
        assert!(job.validate().is_err());

        let mut job = descriptor(JobKind::Single);
        job.command.clear();
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [JobKind::Single, JobKind::Array, JobKind::Gpu, JobKind::GpuArray] {
            let s = kind.to_string();
            let parsed: JobKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
        assert_eq!(JobKind::GpuArray.to_string(), "gpu_array");
    }
}
