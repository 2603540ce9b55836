//! SLURM resource resolution.
//!
//! Maps named resource keys from the `[slurm]` configuration section to
//! concrete directive values, with fallback defaults, and owns the static
//! table of known GPU hardware profiles. Lookups never fail at this layer;
//! higher layers decide whether a missing profile is an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use crate::config::Section;

/// Hard fallback when neither a walltime key nor `default_walltime` is set
pub const FALLBACK_WALLTIME: &str = "4:00:00";

/// Default memory when a memory key is not configured
pub const DEFAULT_MEMORY: &str = "8GB";

/// GPU hardware types known to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum GpuType {
    H200,
    L40s,
    A100,
    V100s,
}

/// Resource figures for one GPU type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuProfile {
    /// `--constraint` value selecting the hardware
    pub constraint: &'static str,
    /// Host memory to request per GPU
    pub cpu_mem_per_gpu: &'static str,
    /// On-device memory (informational, not a directive)
    pub gpu_mem: &'static str,
    /// Walltime to use when the job does not specify one
    pub default_walltime: &'static str,
}

impl GpuType {
    /// Static resource profile for this GPU type
    pub fn profile(self) -> &'static GpuProfile {
        match self {
            GpuType::H200 => &GpuProfile {
                constraint: "h200",
                cpu_mem_per_gpu: "128GB",
                gpu_mem: "141GB",
                default_walltime: "1-00:00:00",
            },
            GpuType::L40s => &GpuProfile {
                constraint: "l40s",
                cpu_mem_per_gpu: "64GB",
                gpu_mem: "48GB",
                default_walltime: "1-00:00:00",
            },
            GpuType::A100 => &GpuProfile {
                constraint: "a100",
                cpu_mem_per_gpu: "64GB",
                gpu_mem: "80GB",
                default_walltime: "1-00:00:00",
            },
            GpuType::V100s => &GpuProfile {
                constraint: "v100s",
                cpu_mem_per_gpu: "32GB",
                gpu_mem: "32GB",
                default_walltime: "1-00:00:00",
            },
        }
    }
}

/// Resolves named resource keys against the `[slurm]` configuration section
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    slurm: Section,
}

impl ResourceConfig {
    pub fn new(slurm: Section) -> Self {
        Self { slurm }
    }

    /// Raw access to a configured key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.slurm.get(key).map(String::as_str)
    }

    /// Memory requirement with fallback
    pub fn memory(&self, memory_key: &str) -> String {
        self.memory_or(memory_key, DEFAULT_MEMORY)
    }

    /// Memory requirement with an explicit fallback default
    pub fn memory_or(&self, memory_key: &str, default: &str) -> String {
        self.slurm
            .get(memory_key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Whether the caller configured this memory key explicitly.
    /// GPU jobs only override memory when it was not.
    pub fn has_memory_key(&self, memory_key: &str) -> bool {
        self.slurm.contains_key(memory_key)
    }

    /// Walltime for a named key, else the process-wide default, else the
    /// hard fallback
    pub fn walltime(&self, walltime_key: Option<&str>) -> String {
        if let Some(key) = walltime_key {
            if let Some(value) = self.slurm.get(key) {
                return value.clone();
            }
        }
        self.slurm
            .get("default_walltime")
            .cloned()
            .unwrap_or_else(|| FALLBACK_WALLTIME.to_string())
    }

    /// GPU resource profile for an explicit type, or for the configured
    /// `gpu_type` key. Unknown or unset designators yield `None`; absence
    /// is not an error at this layer.
    pub fn gpu_resources(&self, gpu_type: Option<&str>) -> Option<&'static GpuProfile> {
        let designator = match gpu_type {
            Some(t) => t.to_string(),
            None => self.slurm.get("gpu_type")?.clone(),
        };
        designator.parse::<GpuType>().ok().map(GpuType::profile)
    }

    /// Base directive parameters shared by every job kind
    pub fn base_directives(&self) -> BTreeMap<&'static str, String> {
        let mut directives = BTreeMap::new();
        directives.insert("account", self.slurm.get("account").cloned().unwrap_or_default());
        directives.insert("email", self.slurm.get("email").cloned().unwrap_or_default());
        directives.insert("nodes", "1".to_string());
        directives.insert("ntasks_per_node", "1".to_string());
        directives.insert("export", "ALL".to_string());
        directives
    }
}
