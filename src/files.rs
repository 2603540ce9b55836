//! Working-directory management and file naming conventions.
//!
//! Owns the pipeline working directory and its `logs/` subdirectory, computes
//! log path templates (SLURM expands `%j` to the job ID and `%A`/`%a` to the
//! array job ID / task index), and writes generated scripts with the
//! executable bit set.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Pipeline working directory, created on construction
#[derive(Debug, Clone)]
pub struct WorkDir {
    working_dir: PathBuf,
    logs_dir: PathBuf,
    basename: String,
}

impl WorkDir {
    /// Create (or reuse) a working directory and its `logs/` subdirectory
    pub fn new(working_dir: impl AsRef<Path>, basename: impl Into<String>) -> Result<Self> {
        let working_dir = working_dir.as_ref().to_path_buf();
        let logs_dir = working_dir.join("logs");
        fs::create_dir_all(&working_dir)?;
        fs::create_dir_all(&logs_dir)?;
        Ok(Self {
            working_dir,
            logs_dir,
            basename: basename.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.working_dir
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Filename carrying an iteration number, e.g. `base_iter003.residual`
    pub fn iteration_filename(&self, filetype: &str, iteration: u32) -> String {
        if iteration > 0 {
            format!("{}_iter{:03}.{}", self.basename, iteration, filetype)
        } else {
            format!("{}.{}", self.basename, filetype)
        }
    }

    /// Log path templates for a job. Array jobs get per-task logs keyed by
    /// `%A` (array master ID) and `%a` (task index); single jobs use `%j`.
    pub fn log_paths(&self, job_prefix: &str, array_job: bool) -> (String, String) {
        let (out, err) = if array_job {
            (
                self.logs_dir.join(format!("{}_%A_%a.out", job_prefix)),
                self.logs_dir.join(format!("{}_%A_%a.err", job_prefix)),
            )
        } else {
            (
                self.logs_dir.join(format!("{}_%j.out", job_prefix)),
                self.logs_dir.join(format!("{}_%j.err", job_prefix)),
            )
        };
        (out.display().to_string(), err.display().to_string())
    }

    /// Write a script into the working directory and mark it executable
    pub fn write_script(&self, content: &str, filename: &str) -> Result<PathBuf> {
        let script_path = self.working_dir.join(filename);
        fs::write(&script_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&script_path)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script_path, perms)?;
        }

        debug!(script = %script_path.display(), "wrote job script");
        Ok(script_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("pipeline_output");
        let wd = WorkDir::new(&work, "base").unwrap();
        assert!(wd.path().is_dir());
        assert!(work.join("logs").is_dir());
    }

    #[test]
    fn test_log_paths_single_vs_array() {
        let dir = tempfile::tempdir().unwrap();
        let wd = WorkDir::new(dir.path(), "base").unwrap();

        let (out, err) = wd.log_paths("base_plan", false);
        assert!(out.ends_with("logs/base_plan_%j.out"));
        assert!(err.ends_with("logs/base_plan_%j.err"));

        let (out, err) = wd.log_paths("base_fill", true);
        assert!(out.ends_with("logs/base_fill_%A_%a.out"));
        assert!(err.ends_with("logs/base_fill_%A_%a.err"));
    }

    #[test]
    fn test_iteration_filename() {
        let dir = tempfile::tempdir().unwrap();
        let wd = WorkDir::new(dir.path(), "run").unwrap();
        assert_eq!(wd.iteration_filename("ms", 0), "run.ms");
        assert_eq!(wd.iteration_filename("ms", 3), "run_iter003.ms");
        assert_eq!(wd.iteration_filename("ms", 12), "run_iter012.ms");
    }

    #[test]
    #[cfg(unix)]
    fn test_write_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let wd = WorkDir::new(dir.path(), "base").unwrap();
        let path = wd.write_script("#!/bin/bash\necho hi\n", "job.sh").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/bash\necho hi\n");
    }
}
