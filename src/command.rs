//! Application command construction.
//!
//! Builds command argument vectors from parameters instead of string
//! templates. Arguments keep their insertion order so generated scripts are
//! reproducible run to run.

use std::path::Path;

use crate::error::{PipelineError, Result};

/// Builds `executable key=value ...` command lines with optional
/// per-mode argument sets
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    executable: Option<String>,
    base_args: Vec<(String, String)>,
    mode_args: Vec<(String, Vec<(String, String)>)>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the main executable path (resolved to an absolute-looking string
    /// as given; existence is the application's concern)
    pub fn executable(&mut self, executable: impl Into<String>) -> &mut Self {
        self.executable = Some(executable.into());
        self
    }

    /// Add or replace a base argument that applies to every mode
    pub fn base_arg(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        upsert(&mut self.base_args, key.into(), value.into());
        self
    }

    /// Add or replace a mode-specific argument
    pub fn mode_arg(
        &mut self,
        mode: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        let mode = mode.into();
        let entry = match self.mode_args.iter_mut().find(|(m, _)| *m == mode) {
            Some((_, args)) => args,
            None => {
                self.mode_args.push((mode, Vec::new()));
                &mut self.mode_args.last_mut().expect("just pushed").1
            }
        };
        upsert(entry, key.into(), value.into());
        self
    }

    /// Build the command vector for a mode. Empty values are skipped.
    pub fn build(&self, mode: Option<&str>) -> Result<Vec<String>> {
        let executable = self
            .executable
            .as_ref()
            .ok_or_else(|| PipelineError::config("command builder: executable not set"))?;

        let mut cmd = vec![executable.clone()];

        for (key, value) in &self.base_args {
            if !value.is_empty() {
                cmd.push(format!("{}={}", key, value));
            }
        }

        if let Some(mode) = mode {
            if let Some((_, args)) = self.mode_args.iter().find(|(m, _)| m == mode) {
                for (key, value) in args {
                    if !value.is_empty() {
                        cmd.push(format!("{}={}", key, value));
                    }
                }
            }
        }

        Ok(cmd)
    }

    /// Build an interpreter-driven worker command in `--key value` form
    pub fn build_worker_command(
        interpreter: &str,
        script_path: &Path,
        args: &[(&str, String)],
    ) -> Vec<String> {
        let mut cmd = vec![interpreter.to_string(), script_path.display().to_string()];
        for (key, value) in args {
            cmd.push(format!("--{}", key));
            cmd.push(value.clone());
        }
        cmd
    }
}

fn upsert(args: &mut Vec<(String, String)>, key: String, value: String) {
    match args.iter_mut().find(|(k, _)| *k == key) {
        Some((_, v)) => *v = value,
        None => args.push((key, value)),
    }
}
