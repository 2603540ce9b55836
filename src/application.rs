//! The collaborator interface every pipeline application implements.
//!
//! An application is one phase group of the pipeline (e.g. the convolution
//! solver). The orchestrator only ever talks to applications through this
//! trait: a precondition check before anything is submitted, and a job
//! generation call producing descriptors tagged with their logical
//! prerequisites.

use crate::error::Result;
use crate::job::JobDescriptor;

pub trait Application {
    /// Application name, used for parameter lookup and error reporting
    fn name(&self) -> &str;

    /// Check that all required configuration for this application is present.
    /// Runs during `validate()`, before any submission.
    fn validate_requirements(&self) -> Result<()>;

    /// Generate this application's jobs: render scripts, write them, and
    /// return the descriptors. Each descriptor may name other jobs it
    /// depends on (within or across applications).
    fn generate_jobs(&mut self) -> Result<Vec<JobDescriptor>>;
}
