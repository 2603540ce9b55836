//! SLURM script rendering.
//!
//! A script has three sections in a fixed template: directives, environment
//! setup, command. Directive rendering follows a compatibility contract with
//! sbatch's flag syntax: a fixed, ordered list of standard keys, each emitted
//! as `#SBATCH --key=value` with underscores converted to hyphens, followed
//! by the special directives (array, dependency, constraint, gres) in that
//! order. Do not reorder.

use serde::{Deserialize, Serialize};

/// Standard directive keys in emission order. Keys absent or empty in the
/// directive set are skipped.
pub const STANDARD_KEYS: [&str; 12] = [
    "export",
    "chdir",
    "time",
    "mem",
    "nodes",
    "ntasks_per_node",
    "output",
    "error",
    "job_name",
    "account",
    "mail_user",
    "mail_type",
];

/// The full set of directives for one job. One field per recognized key, so
/// duplicates are impossible by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveSet {
    pub export: Option<String>,
    pub chdir: Option<String>,
    pub time: Option<String>,
    pub mem: Option<String>,
    pub nodes: Option<String>,
    pub ntasks_per_node: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub job_name: Option<String>,
    pub account: Option<String>,
    pub mail_user: Option<String>,
    pub mail_type: Option<String>,
    /// `--array` range, array kinds only
    pub array: Option<String>,
    /// `--dependency` expression (`afterok:<ref>`)
    pub dependency: Option<String>,
    /// `--constraint`, GPU kinds only
    pub constraint: Option<String>,
    /// `--gres` request (`gpu:<count>`), GPU kinds only
    pub gres: Option<String>,
}

impl DirectiveSet {
    /// Standard key/value pairs in canonical order
    fn standard_pairs(&self) -> [(&'static str, &Option<String>); 12] {
        [
            ("export", &self.export),
            ("chdir", &self.chdir),
            ("time", &self.time),
            ("mem", &self.mem),
            ("nodes", &self.nodes),
            ("ntasks_per_node", &self.ntasks_per_node),
            ("output", &self.output),
            ("error", &self.error),
            ("job_name", &self.job_name),
            ("account", &self.account),
            ("mail_user", &self.mail_user),
            ("mail_type", &self.mail_type),
        ]
    }
}

/// Render the `#SBATCH` directive block for one job
pub fn render_directives(directives: &DirectiveSet) -> String {
    let mut lines = Vec::new();

    for (key, value) in directives.standard_pairs() {
        if let Some(value) = value {
            if !value.is_empty() {
                // ntasks_per_node -> ntasks-per-node, mail_user -> mail-user
                let flag = key.replace('_', "-");
                lines.push(format!("#SBATCH --{}={}", flag, value));
            }
        }
    }

    // Special directives, appended after the standard set in fixed order
    if let Some(ref range) = directives.array {
        lines.push(format!("#SBATCH --array={}", range));
    }
    if let Some(ref dep) = directives.dependency {
        if !dep.is_empty() {
            lines.push(format!("#SBATCH --dependency={}", dep));
        }
    }
    if let Some(ref constraint) = directives.constraint {
        lines.push(format!("#SBATCH --constraint={}", constraint));
    }
    if let Some(ref gres) = directives.gres {
        lines.push(format!("#SBATCH --gres={}", gres));
    }

    lines.join("\n")
}

/// Render a complete sbatch script from directives, an opaque environment
/// setup block, and the command argument vector (space-joined).
pub fn render_script(directives: &DirectiveSet, command: &[String], environment_setup: &str) -> String {
    format!(
        "#!/bin/bash\n{directives}\n\n{environment_setup}\n\n{command}\n",
        directives = render_directives(directives),
        environment_setup = environment_setup,
        command = command.join(" "),
    )
}
