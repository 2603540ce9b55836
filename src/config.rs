//! Pipeline definition file handling.
//!
//! Pipelines are described by a sectioned key/value `.def` file with two
//! required sections, `[common]` and `[slurm]`, plus one optional section per
//! application. Values are kept as strings; components that need typed values
//! parse them at the point of use.
//!
//! Configurations can also be saved to / loaded from JSON, which is handy for
//! regression fixtures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// One parsed configuration section: insertion order is irrelevant,
/// lookups are by key.
pub type Section = BTreeMap<String, String>;

/// Parsed pipeline definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// `[common]` section: parameters shared by every application
    pub common: Section,
    /// `[slurm]` section: account, email, memory/walltime keys, gpu_type
    pub slurm: Section,
    /// Per-application sections, keyed by section name
    pub apps: BTreeMap<String, Section>,
}

impl PipelineConfig {
    /// Parse a `.def` file from disk
    pub fn load_def<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            PipelineError::config(format!(
                "cannot read definition file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::parse_def(&content)
    }

    /// Parse `.def` text: `[section]` headers, `key = value` lines,
    /// `#`/`;` comments, blank lines ignored
    pub fn parse_def(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current: Option<String> = None;

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = Some(name.trim().to_string());
                if let Some(ref section) = current {
                    // Materialize app sections even when empty
                    if section != "common" && section != "slurm" {
                        config.apps.entry(section.clone()).or_default();
                    }
                }
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(PipelineError::config(format!(
                    "line {}: expected 'key = value', got '{}'",
                    lineno + 1,
                    line
                )));
            };
            let key = key.trim().to_string();
            let value = value.trim().to_string();

            match current.as_deref() {
                Some("common") => {
                    config.common.insert(key, value);
                }
                Some("slurm") => {
                    config.slurm.insert(key, value);
                }
                Some(app) => {
                    config.apps.entry(app.to_string()).or_default().insert(key, value);
                }
                None => {
                    return Err(PipelineError::config(format!(
                        "line {}: key '{}' appears before any [section] header",
                        lineno + 1,
                        key
                    )));
                }
            }
        }

        config.validate_sections()?;
        Ok(config)
    }

    /// Required sections must be present (they may still be missing keys;
    /// `validate_required_params` checks those)
    fn validate_sections(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.common.is_empty() {
            missing.push("common");
        }
        if self.slurm.is_empty() {
            missing.push("slurm");
        }
        if !missing.is_empty() {
            return Err(PipelineError::config(format!(
                "missing required sections: {:?}",
                missing
            )));
        }
        Ok(())
    }

    /// Validate that essential parameters exist
    pub fn validate_required_params(&self) -> Result<()> {
        let required_common = ["vis", "basename"];
        let missing_common: Vec<&str> = required_common
            .iter()
            .copied()
            .filter(|p| !self.common.contains_key(*p))
            .collect();

        let required_slurm = ["account", "email"];
        let missing_slurm: Vec<&str> = required_slurm
            .iter()
            .copied()
            .filter(|p| !self.slurm.contains_key(*p))
            .collect();

        let mut errors = Vec::new();
        if !missing_common.is_empty() {
            errors.push(format!("missing required [common] parameters: {:?}", missing_common));
        }
        if !missing_slurm.is_empty() {
            errors.push(format!("missing required [slurm] parameters: {:?}", missing_slurm));
        }
        if !errors.is_empty() {
            return Err(PipelineError::config(errors.join(". ")));
        }
        Ok(())
    }

    /// Get parameters for a specific application; empty map if the section
    /// is absent
    pub fn app_params(&self, app_name: &str) -> Section {
        self.apps.get(app_name).cloned().unwrap_or_default()
    }

    /// Save configuration to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<Self> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(self.clone())
    }

    /// Load configuration from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate_sections()?;
        Ok(config)
    }
}
