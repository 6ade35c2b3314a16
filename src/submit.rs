//! HTCondor submit descriptions for running a transfer as a job.
//!
//! The job runs this same executable in the local universe. If it exits with
//! `NEEDS_USER_INPUT` it is held until `globus release` activates the
//! endpoints it recorded.

use std::path::Path;

use crate::constants;

/// Quote `args` for the submit file `arguments` command (the "new" syntax:
/// the whole list in double quotes, arguments with whitespace or quotes in
/// single quotes, embedded quotes doubled).
pub fn quote_arguments(args: &[String]) -> String {
    let quoted: Vec<String> = args
        .iter()
        .map(|arg| {
            let escaped = arg.replace('"', "\"\"");
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '\'') {
                format!("'{}'", escaped.replace('\'', "''"))
            } else {
                escaped
            }
        })
        .collect();
    format!("\"{}\"", quoted.join(" "))
}

pub fn submit_description(executable: &Path, args: &[String], label: Option<&str>) -> String {
    let name = label.unwrap_or("globus-transfer");
    let lines = [
        "universe = local".to_string(),
        format!("executable = {}", executable.display()),
        format!("arguments = {}", quote_arguments(args)),
        format!("+{} = True", constants::IS_GLOBUS_JOB),
        format!("on_exit_hold = ExitCode == {}", constants::NEEDS_USER_INPUT),
        "on_exit_hold_reason = \"Globus endpoint activation required, run globus release\""
            .to_string(),
        "getenv = true".to_string(),
        format!("log = {name}.log"),
        format!("output = {name}.out"),
        format!("error = {name}.err"),
        "queue 1".to_string(),
    ];
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plain_arguments_are_space_joined() {
        assert_eq!(
            quote_arguments(&args(&["transfer", "src", "dst", "/a:/b"])),
            "\"transfer src dst /a:/b\""
        );
    }

    #[test]
    fn whitespace_and_quotes_are_escaped() {
        assert_eq!(
            quote_arguments(&args(&["--label", "my run's \"data\""])),
            "\"--label 'my run''s \"\"data\"\"'\""
        );
    }

    #[test]
    fn description_marks_job_and_holds_on_user_input() {
        let description = submit_description(
            &PathBuf::from("/usr/bin/globus"),
            &args(&["transfer", "a", "b", "/x:/y", "--wait"]),
            Some("nightly"),
        );
        assert!(description.contains("universe = local\n"));
        assert!(description.contains("executable = /usr/bin/globus\n"));
        assert!(description.contains("arguments = \"transfer a b /x:/y --wait\"\n"));
        assert!(description.contains("+IsGlobusJob = True\n"));
        assert!(description.contains("on_exit_hold = ExitCode == 2\n"));
        assert!(description.contains("log = nightly.log\n"));
        assert!(description.ends_with("queue 1\n"));
    }
}
