use std::process::Command;
use std::time::Instant;

use super::{classad, JobAd, Scheduler};
use crate::error::JobError;

/// Talks to HTCondor through its command-line tools.
pub struct CondorCli;

impl CondorCli {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, JobError> {
        let command = format!("{program} {}", args.join(" "));
        tracing::debug!("[condor] >>> {command}");
        let start = Instant::now();

        let output = Command::new(program).args(args).output().map_err(|e| JobError::Command {
            command: command.clone(),
            stderr: e.to_string(),
        })?;

        let elapsed = start.elapsed();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                "[condor] <<< FAILED (exit={}, {}ms): {stderr}",
                output.status.code().unwrap_or(-1),
                elapsed.as_millis()
            );
            return Err(JobError::Command { command, stderr });
        }

        tracing::debug!(
            "[condor] <<< OK ({}ms, {} bytes)",
            elapsed.as_millis(),
            output.stdout.len()
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Scheduler for CondorCli {
    fn query(&self, constraint: &str) -> Result<Vec<JobAd>, JobError> {
        let stdout = self.run("condor_q", &["-json", "-constraint", constraint])?;
        Ok(classad::parse_json_ads(&stdout)?
            .into_iter()
            .map(JobAd::new)
            .collect())
    }

    fn edit(&self, constraint: &str, key: &str, value: &str) -> Result<(), JobError> {
        self.run("condor_qedit", &["-constraint", constraint, key, value])
            .map(|_| ())
    }

    fn chirp_set_job_attr(&self, key: &str, value: &str) -> Result<(), JobError> {
        self.run("condor_chirp", &["set_job_attr", key, value])
            .map(|_| ())
    }

    fn release(&self, constraint: &str) -> Result<(), JobError> {
        self.run("condor_release", &["-constraint", constraint])
            .map(|_| ())
    }
}
