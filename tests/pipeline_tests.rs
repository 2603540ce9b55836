// Integration tests for slurm-pipeline
//
// These drive the public API end to end: definition parsing, script
// generation through the solver application, dependency-ordered submission
// against a scripted scheduler double, and the real subprocess boundary
// against stub sbatch/squeue scripts.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use slurm_pipeline::{
    JobStatus, PipelineConfig, PipelineDriver, SchedulerClient, SessionState, SlurmClient,
    SolverApp, SubmittedId, WorkDir,
};

const DEF: &str = "\
[common]
vis = obs.ms
basename = run7
iterations = 2

[slurm]
account = acct1
email = user@example.edu
solver_nprocs = 4
solver_mem = 4GB
default_walltime = 3:00:00

[solver]
wplanes = 1
cache = run7.cf
";

#[derive(Debug, Clone)]
struct SubmitCall {
    script: PathBuf,
    dependency: Option<String>,
    dry_run: bool,
}

/// Scheduler double handing out sequential IDs
#[derive(Default)]
struct FakeScheduler {
    calls: Rc<RefCell<Vec<SubmitCall>>>,
    next_id: RefCell<u64>,
}

impl FakeScheduler {
    fn new() -> (Box<Self>, Rc<RefCell<Vec<SubmitCall>>>) {
        let scheduler = Box::new(Self {
            next_id: RefCell::new(5000),
            ..Default::default()
        });
        let calls = Rc::clone(&scheduler.calls);
        (scheduler, calls)
    }
}

impl SchedulerClient for FakeScheduler {
    fn submit(
        &self,
        script: &Path,
        dependency: Option<&str>,
        dry_run: bool,
    ) -> anyhow::Result<String> {
        self.calls.borrow_mut().push(SubmitCall {
            script: script.to_path_buf(),
            dependency: dependency.map(str::to_string),
            dry_run,
        });
        let mut next = self.next_id.borrow_mut();
        let id = next.to_string();
        *next += 1;
        Ok(id)
    }

    fn query_state(&self, _job_id: &str) -> anyhow::Result<Option<String>> {
        Ok(Some("PENDING".to_string()))
    }
}

/// Set up a workspace with a stub solver executable and a parsed definition
fn setup(dir: &Path) -> (PipelineConfig, WorkDir, PathBuf) {
    let exe = dir.join("solver");
    fs::write(&exe, "#!/bin/bash\n").unwrap();
    let config = PipelineConfig::parse_def(DEF).unwrap();
    let workdir = WorkDir::new(dir.join("out"), "run7").unwrap();
    (config, workdir, exe)
}

#[test]
fn test_full_pipeline_generate_validate_submit() {
    let dir = tempfile::tempdir().unwrap();
    let (config, workdir, exe) = setup(dir.path());

    let (scheduler, calls) = FakeScheduler::new();
    let mut driver = PipelineDriver::new(scheduler);
    driver.add_application(Box::new(SolverApp::new(&config, workdir, exe)));

    driver.generate_all().unwrap();
    assert_eq!(driver.jobs().len(), 2);
    driver.validate().unwrap();

    let records = driver.submit(false).unwrap();
    assert_eq!(driver.state(), SessionState::Complete);
    assert_eq!(
        records["run7_solver_plan"],
        SubmittedId::Real("5000".to_string())
    );
    assert_eq!(
        records["run7_solver_fill"],
        SubmittedId::Real("5001".to_string())
    );

    // Plan first, fill second with the plan's ID in its dependency expression
    let calls = calls.borrow();
    assert!(calls[0].script.ends_with("run7_solver_plan.sh"));
    assert_eq!(calls[0].dependency, None);
    assert!(calls[1].script.ends_with("run7_solver_fill.sh"));
    assert_eq!(calls[1].dependency.as_deref(), Some("afterok:5000"));
    assert!(calls.iter().all(|c| !c.dry_run));
}

#[test]
fn test_generated_scripts_on_disk_match_contract() {
    let dir = tempfile::tempdir().unwrap();
    let (config, workdir, exe) = setup(dir.path());

    let (scheduler, _) = FakeScheduler::new();
    let mut driver = PipelineDriver::new(scheduler);
    driver.add_application(Box::new(SolverApp::new(&config, workdir, exe)));
    driver.generate_all().unwrap();

    let plan = fs::read_to_string(dir.path().join("out/run7_solver_plan.sh")).unwrap();
    assert!(plan.starts_with("#!/bin/bash\n#SBATCH"));
    assert!(plan.contains("#SBATCH --mem=4GB"));
    assert!(plan.contains("#SBATCH --account=acct1"));
    assert!(plan.contains("#SBATCH --job-name=run7_solver_plan"));
    assert!(plan.contains("_%j.out"));
    assert!(!plan.contains("--array"));

    let fill = fs::read_to_string(dir.path().join("out/run7_solver_fill.sh")).unwrap();
    assert!(fill.contains("#SBATCH --array=0-3"));
    assert!(fill.contains("_%A_%a.out"));
}

#[test]
fn test_dry_run_records_simulated_ids_and_flags_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let (config, workdir, exe) = setup(dir.path());

    let (scheduler, calls) = FakeScheduler::new();
    let mut driver = PipelineDriver::new(scheduler);
    driver.add_application(Box::new(SolverApp::new(&config, workdir, exe)));
    driver.generate_all().unwrap();
    driver.validate().unwrap();

    let records = driver.submit(true).unwrap();
    assert!(records.values().all(SubmittedId::is_simulated));
    assert_eq!(
        records["run7_solver_plan"].as_str(),
        "DRY_RUN_run7_solver_plan"
    );
    assert!(calls.borrow().iter().all(|c| c.dry_run));

    // Simulated jobs report DRY_RUN status without touching the scheduler
    let statuses = driver.query_status();
    assert!(statuses.values().all(|s| *s == JobStatus::Simulated));
}

#[test]
fn test_validation_failure_blocks_submission() {
    let dir = tempfile::tempdir().unwrap();
    let (config, workdir, _) = setup(dir.path());

    // Point the application at a missing executable: generation still works
    // (the script does not need the binary), validation must fail
    let (scheduler, calls) = FakeScheduler::new();
    let mut driver = PipelineDriver::new(scheduler);
    driver.add_application(Box::new(SolverApp::new(
        &config,
        workdir,
        dir.path().join("missing_solver"),
    )));
    driver.generate_all().unwrap();

    let err = driver.validate().unwrap_err();
    assert!(err.to_string().contains("executable not found"));

    assert!(driver.submit(false).is_err());
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_two_runs_produce_identical_submission_orders() {
    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let (config, workdir, exe) = setup(dir.path());
        let (scheduler, _) = FakeScheduler::new();
        let mut driver = PipelineDriver::new(scheduler);
        driver.add_application(Box::new(SolverApp::new(&config, workdir, exe)));
        driver.generate_all().unwrap();
        driver.submission_order().unwrap()
    };
    assert_eq!(run(), run());
}

// ---------------------------------------------------------------------------
// Subprocess boundary tests against stub sbatch/squeue scripts
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
#[cfg(unix)]
fn test_slurm_client_parses_sbatch_output() {
    let dir = tempfile::tempdir().unwrap();
    let sbatch = write_stub(
        dir.path(),
        "sbatch",
        "#!/bin/bash\necho \"Submitted batch job 4242\"\n",
    );
    let squeue = write_stub(dir.path(), "squeue", "#!/bin/bash\necho RUNNING\n");
    let script = write_stub(dir.path(), "job.sh", "#!/bin/bash\ntrue\n");

    let client = SlurmClient::with_commands(
        sbatch.display().to_string(),
        squeue.display().to_string(),
    );
    let id = client.submit(&script, Some("afterok:1"), false).unwrap();
    assert_eq!(id, "4242");
    assert_eq!(client.query_state("4242").unwrap().as_deref(), Some("RUNNING"));
}

#[test]
#[cfg(unix)]
fn test_slurm_client_submission_failure_surfaces_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let sbatch = write_stub(
        dir.path(),
        "sbatch",
        "#!/bin/bash\necho \"sbatch: error: Invalid account\" >&2\nexit 1\n",
    );
    let squeue = write_stub(dir.path(), "squeue", "#!/bin/bash\nexit 1\n");
    let script = write_stub(dir.path(), "job.sh", "#!/bin/bash\ntrue\n");

    let client = SlurmClient::with_commands(
        sbatch.display().to_string(),
        squeue.display().to_string(),
    );
    let err = client.submit(&script, None, false).unwrap_err();
    assert!(err.to_string().contains("Invalid account"));

    // Query failures are errors at the boundary; the orchestrator degrades them
    assert!(client.query_state("1").is_err());
}

#[test]
#[cfg(unix)]
fn test_slurm_client_empty_squeue_means_completed() {
    let dir = tempfile::tempdir().unwrap();
    let sbatch = write_stub(dir.path(), "sbatch", "#!/bin/bash\n");
    let squeue = write_stub(dir.path(), "squeue", "#!/bin/bash\n");
    let script = write_stub(dir.path(), "job.sh", "#!/bin/bash\ntrue\n");

    let client = SlurmClient::with_commands(
        sbatch.display().to_string(),
        squeue.display().to_string(),
    );
    assert_eq!(client.query_state("4242").unwrap(), None);

    // Dry-run submission succeeds even when sbatch prints nothing
    let id = client.submit(&script, None, true).unwrap();
    assert!(id.is_empty());
}

// ---------------------------------------------------------------------------
// Status reporting through the orchestrator
// ---------------------------------------------------------------------------

struct StatefulScheduler {
    states: BTreeMap<String, Option<String>>,
}

impl SchedulerClient for StatefulScheduler {
    fn submit(&self, script: &Path, _: Option<&str>, _: bool) -> anyhow::Result<String> {
        let name = script.file_stem().unwrap().to_string_lossy();
        Ok(format!("id_{}", name))
    }

    fn query_state(&self, job_id: &str) -> anyhow::Result<Option<String>> {
        match self.states.get(job_id) {
            Some(state) => Ok(state.clone()),
            None => anyhow::bail!("unknown job"),
        }
    }
}

#[test]
fn test_status_degradation_through_public_api() {
    let dir = tempfile::tempdir().unwrap();
    let (config, workdir, exe) = setup(dir.path());

    let mut states = BTreeMap::new();
    states.insert("id_run7_solver_plan".to_string(), Some("RUNNING".to_string()));
    states.insert("id_run7_solver_fill".to_string(), None);

    let mut driver = PipelineDriver::new(Box::new(StatefulScheduler { states }));
    driver.add_application(Box::new(SolverApp::new(&config, workdir, exe)));
    driver.generate_all().unwrap();
    driver.validate().unwrap();
    driver.submit(false).unwrap();

    let statuses = driver.query_status();
    assert_eq!(
        statuses["run7_solver_plan"],
        JobStatus::Reported("RUNNING".to_string())
    );
    assert_eq!(statuses["run7_solver_fill"], JobStatus::Completed);
}
