//! The scheduler boundary: sbatch submission and squeue status queries.
//!
//! SLURM is invoked only through the `SchedulerClient` trait, which keeps the
//! orchestrator testable without a cluster. The subprocess implementation
//! parses sbatch/squeue output minimally: the job ID is the last whitespace
//! token of sbatch's stdout ("Submitted batch job 12345"), and squeue's `%T`
//! format yields a single state token or nothing at all.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Abstract submission/status boundary
pub trait SchedulerClient {
    /// Submit a script, optionally with a `--dependency` expression.
    /// Returns the scheduler-assigned job ID. In dry-run mode the scheduler
    /// is still invoked (with its test flag) but no ID is parsed; the caller
    /// records a sentinel instead.
    fn submit(&self, script: &Path, dependency: Option<&str>, dry_run: bool) -> Result<String>;

    /// Query the current state of a job. `Ok(None)` means the scheduler no
    /// longer tracks the job (interpreted as completed by callers).
    fn query_state(&self, job_id: &str) -> Result<Option<String>>;
}

/// Real SLURM boundary driving `sbatch` and `squeue` subprocesses
#[derive(Debug, Clone)]
pub struct SlurmClient {
    sbatch: String,
    squeue: String,
}

impl Default for SlurmClient {
    fn default() -> Self {
        Self {
            sbatch: "sbatch".to_string(),
            squeue: "squeue".to_string(),
        }
    }
}

impl SlurmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the binary names, mainly for tests against stub scripts
    pub fn with_commands(sbatch: impl Into<String>, squeue: impl Into<String>) -> Self {
        Self {
            sbatch: sbatch.into(),
            squeue: squeue.into(),
        }
    }
}

impl SchedulerClient for SlurmClient {
    fn submit(&self, script: &Path, dependency: Option<&str>, dry_run: bool) -> Result<String> {
        let mut cmd = Command::new(&self.sbatch);
        if dry_run {
            cmd.arg("--test-only");
        }
        if let Some(dep) = dependency {
            cmd.args(["--dependency", dep]);
        }
        cmd.arg(script);

        debug!(?cmd, "invoking sbatch");
        let output = cmd
            .output()
            .with_context(|| format!("failed to spawn {}", self.sbatch))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", self.sbatch, output.status, stderr.trim());
        }

        if dry_run {
            // --test-only reports to stderr and assigns no ID
            return Ok(String::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parse_job_id(&stdout)
            .with_context(|| format!("malformed sbatch output: '{}'", stdout.trim()))?;
        info!(job_id = %job_id, script = %script.display(), "submitted batch job");
        Ok(job_id)
    }

    fn query_state(&self, job_id: &str) -> Result<Option<String>> {
        let output = Command::new(&self.squeue)
            .args(["-j", job_id, "-h", "-o", "%T"])
            .output()
            .with_context(|| format!("failed to spawn {}", self.squeue))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", self.squeue, output.status, stderr.trim());
        }

        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if state.is_empty() {
            Ok(None)
        } else {
            Ok(Some(state))
        }
    }
}

/// The job ID is the last whitespace-separated token of sbatch's stdout
fn parse_job_id(stdout: &str) -> Result<String> {
    match stdout.split_whitespace().last() {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => bail!("no job ID token in sbatch output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_id_standard_output() {
        assert_eq!(parse_job_id("Submitted batch job 12345\n").unwrap(), "12345");
    }

    #[test]
    fn test_parse_job_id_tolerates_extra_whitespace() {
        assert_eq!(parse_job_id("  Submitted batch job   987  \n\n").unwrap(), "987");
    }

    #[test]
    fn test_parse_job_id_empty_output_is_error() {
        assert!(parse_job_id("").is_err());
        assert!(parse_job_id("   \n").is_err());
    }

    #[test]
    fn test_default_commands() {
        let client = SlurmClient::new();
        assert_eq!(client.sbatch, "sbatch");
        assert_eq!(client.squeue, "squeue");
    }
}
