//! Pipeline orchestration: job registry, dependency graph, submission.
//!
//! The driver owns every descriptor generated in a session, the dependency
//! edges between them, and the submission records mapping job names to
//! scheduler-assigned IDs. A session is one process run; nothing is persisted.
//!
//! Submission is strictly sequential in topological order. That is a
//! correctness requirement, not a simplification: a dependent's
//! `--dependency` expression needs its prerequisite's job ID, which is only
//! known once the prerequisite's sbatch call has returned.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use strum::Display;
use tracing::{info, warn};

use crate::application::Application;
use crate::builder::dependency_expression;
use crate::error::{PipelineError, Result};
use crate::job::JobDescriptor;
use crate::scheduler::SchedulerClient;

/// Session lifecycle. Transitions only move forward; a failed submission
/// parks the session in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Empty,
    Populated,
    Validated,
    Submitting,
    Complete,
    Failed,
}

/// Scheduler-assigned run-time identifier, or the dry-run sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmittedId {
    Real(String),
    Simulated(String),
}

impl SubmittedId {
    pub fn as_str(&self) -> &str {
        match self {
            SubmittedId::Real(id) | SubmittedId::Simulated(id) => id,
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, SubmittedId::Simulated(_))
    }
}

/// Status of one submitted job as reported by the scheduler boundary.
/// Query failures degrade to `Unknown`; they never propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Dry-run submission, nothing to query
    Simulated,
    /// Scheduler no longer tracks the job
    Completed,
    /// Status query failed
    Unknown,
    /// State token as reported by squeue (PENDING, RUNNING, ...)
    Reported(String),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Simulated => write!(f, "DRY_RUN"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Unknown => write!(f, "UNKNOWN"),
            JobStatus::Reported(state) => write!(f, "{}", state),
        }
    }
}

/// Orchestrates script generation, dependency validation, and submission
/// for one pipeline session
pub struct PipelineDriver {
    scheduler: Box<dyn SchedulerClient>,
    applications: Vec<Box<dyn Application>>,
    /// Registration-order arena; graph algorithms reference jobs by index
    jobs: Vec<JobDescriptor>,
    index: HashMap<String, usize>,
    /// Job name -> scheduler ID, immutable once written
    records: BTreeMap<String, SubmittedId>,
    state: SessionState,
}

impl PipelineDriver {
    pub fn new(scheduler: Box<dyn SchedulerClient>) -> Self {
        Self {
            scheduler,
            applications: Vec::new(),
            jobs: Vec::new(),
            index: HashMap::new(),
            records: BTreeMap::new(),
            state: SessionState::Empty,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn jobs(&self) -> &[JobDescriptor] {
        &self.jobs
    }

    pub fn records(&self) -> &BTreeMap<String, SubmittedId> {
        &self.records
    }

    /// Add an application to the pipeline
    pub fn add_application(&mut self, application: Box<dyn Application>) {
        self.applications.push(application);
    }

    /// Generate scripts for every application and register the resulting
    /// descriptors
    pub fn generate_all(&mut self) -> Result<()> {
        let mut generated = Vec::new();
        for application in &mut self.applications {
            info!(app = application.name(), "generating scripts");
            generated.extend(application.generate_jobs()?);
        }
        for descriptor in generated {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Register one descriptor. Rejects duplicate names; dependency edges
    /// are taken from the descriptor's `depends_on` set.
    pub fn register(&mut self, descriptor: JobDescriptor) -> Result<()> {
        descriptor.validate()?;
        if self.index.contains_key(&descriptor.name) {
            return Err(PipelineError::validation(format!(
                "duplicate job name: {}",
                descriptor.name
            )));
        }
        self.index.insert(descriptor.name.clone(), self.jobs.len());
        self.jobs.push(descriptor);
        if self.state == SessionState::Empty {
            self.state = SessionState::Populated;
        }
        Ok(())
    }

    /// Validate the session: every application's own preconditions, then
    /// graph acyclicity. Both must pass to reach `Validated`.
    pub fn validate(&mut self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(PipelineError::state(
                "no jobs registered; call generate_all() first",
            ));
        }

        let mut errors = Vec::new();
        for application in &self.applications {
            if let Err(e) = application.validate_requirements() {
                errors.push(format!("{}: {}", application.name(), e));
            }
        }

        for job in &self.jobs {
            for dep in &job.depends_on {
                if !self.index.contains_key(dep) {
                    // A prerequisite outside this session is not an error;
                    // it simply cannot be ordered or resolved here.
                    warn!(job = %job.name, prerequisite = %dep, "prerequisite not registered in this session");
                }
            }
        }

        if let Some(offender) = self.find_cycle() {
            errors.push(format!("circular dependency detected involving job: {}", offender));
        }

        if !errors.is_empty() {
            return Err(PipelineError::validation(errors.join("; ")));
        }

        self.state = SessionState::Validated;
        Ok(())
    }

    /// Prerequisite indices for job `i`, restricted to registered jobs
    fn prerequisites(&self, i: usize) -> Vec<usize> {
        self.jobs[i]
            .depends_on
            .iter()
            .filter_map(|name| self.index.get(name).copied())
            .collect()
    }

    /// Three-color depth-first search. Returns the name of a job that closes
    /// a cycle, if any.
    fn find_cycle(&self) -> Option<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit(driver: &PipelineDriver, node: usize, colors: &mut [Color]) -> Option<usize> {
            colors[node] = Color::InProgress;
            for prereq in driver.prerequisites(node) {
                match colors[prereq] {
                    Color::InProgress => return Some(prereq),
                    Color::Unvisited => {
                        if let Some(offender) = visit(driver, prereq, colors) {
                            return Some(offender);
                        }
                    }
                    Color::Done => {}
                }
            }
            colors[node] = Color::Done;
            None
        }

        let mut colors = vec![Color::Unvisited; self.jobs.len()];
        for node in 0..self.jobs.len() {
            if colors[node] == Color::Unvisited {
                if let Some(offender) = visit(self, node, &mut colors) {
                    return Some(self.jobs[offender].name.clone());
                }
            }
        }
        None
    }

    /// Kahn's algorithm over the dependency edges. Ties break by
    /// registration order, so two runs over the same input produce
    /// identical orders.
    pub fn submission_order(&self) -> Result<Vec<String>> {
        let n = self.jobs.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for node in 0..n {
            for prereq in self.prerequisites(node) {
                in_degree[node] += 1;
                dependents[prereq].push(node);
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(self.jobs[node].name.clone());
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < n {
            // A cycle slipped past validate(); this is a bug, not user error
            return Err(PipelineError::internal(format!(
                "submission order covers {} of {} jobs; dependency graph has a cycle validation missed",
                order.len(),
                n
            )));
        }
        Ok(order)
    }

    /// Submit every job in topological order. Fail-fast: the first failure
    /// aborts the remaining sequence; already-submitted jobs are not rolled
    /// back. Requires `Validated`.
    pub fn submit(&mut self, dry_run: bool) -> Result<BTreeMap<String, SubmittedId>> {
        if self.state != SessionState::Validated {
            return Err(PipelineError::state(format!(
                "submit requires a validated session (state is '{}')",
                self.state
            )));
        }

        let order = self.submission_order()?;
        self.state = SessionState::Submitting;

        for job_name in &order {
            let node = self.index[job_name];
            let job = &self.jobs[node];

            // Topological order guarantees every registered prerequisite
            // already has a record; a miss here is an internal fault.
            let mut resolved = Vec::new();
            for prereq in self.prerequisites(node) {
                let prereq_name = &self.jobs[prereq].name;
                match self.records.get(prereq_name) {
                    Some(id) => resolved.push(id.as_str().to_string()),
                    None => {
                        self.state = SessionState::Failed;
                        return Err(PipelineError::internal(format!(
                            "{}: prerequisite '{}' has no submission record",
                            job_name, prereq_name
                        )));
                    }
                }
            }

            let dep_expr = if resolved.is_empty() {
                None
            } else {
                Some(dependency_expression(&resolved))
            };

            info!(job = %job_name, dependency = ?dep_expr, dry_run, "submitting");
            let submitted = self
                .scheduler
                .submit(&job.script_path, dep_expr.as_deref(), dry_run);

            let id = match submitted {
                Ok(id) => {
                    if dry_run {
                        SubmittedId::Simulated(format!("DRY_RUN_{}", job_name))
                    } else {
                        SubmittedId::Real(id)
                    }
                }
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(PipelineError::submission(job_name.clone(), e.to_string()));
                }
            };

            info!(job = %job_name, id = id.as_str(), "submission recorded");
            self.records.insert(job_name.clone(), id);
        }

        self.state = SessionState::Complete;
        Ok(self.records.clone())
    }

    /// Query the scheduler for each submitted job. Simulated submissions are
    /// reported as such; a failed or empty query degrades to
    /// Unknown/Completed rather than erroring.
    pub fn query_status(&self) -> BTreeMap<String, JobStatus> {
        let mut statuses = BTreeMap::new();
        for (job_name, id) in &self.records {
            let status = if id.is_simulated() {
                JobStatus::Simulated
            } else {
                match self.scheduler.query_state(id.as_str()) {
                    Ok(Some(state)) => JobStatus::Reported(state),
                    Ok(None) => JobStatus::Completed,
                    Err(e) => {
                        warn!(job = %job_name, error = %e, "status query failed");
                        JobStatus::Unknown
                    }
                }
            };
            statuses.insert(job_name.clone(), status);
        }
        statuses
    }

    /// Human-readable summary of the registered pipeline
    pub fn summary(&self) -> String {
        let mut out = String::from("=== Pipeline Summary ===\n");
        out.push_str(&format!("Applications: {}\n", self.applications.len()));
        for application in &self.applications {
            out.push_str(&format!("  - {}\n", application.name()));
        }
        out.push_str(&format!("Generated jobs: {}\n", self.jobs.len()));
        for job in &self.jobs {
            out.push_str(&format!("  - {} ({})\n", job.name, job.kind));
            if let Some(ref phase) = job.phase {
                out.push_str(&format!("    Phase: {}\n", phase));
            }
            if !job.depends_on.is_empty() {
                out.push_str(&format!("    Depends on: {}\n", job.depends_on.join(", ")));
            }
        }
        out
    }
}
