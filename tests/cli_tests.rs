use assert_cmd::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Run `globus` against a settings file inside `home`.
fn globus(home: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("globus");
    cmd.env("GLOBUS_TRANSFER_SETTINGS", home.path().join("settings.toml"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    globus(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("transfer")
                .and(predicate::str::contains("release"))
                .and(predicate::str::contains("bookmarks")),
        );
}

#[test]
fn bookmark_add_list_remove() {
    let home = TempDir::new().unwrap();

    globus(&home)
        .args(["bookmarks", "add", "laptop", "ep-1234"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added bookmark laptop -> ep-1234"));

    globus(&home)
        .args(["bookmarks", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("laptop").and(predicate::str::contains("ep-1234")));

    globus(&home)
        .args(["bookmarks", "rm", "laptop"])
        .assert()
        .success();

    globus(&home)
        .args(["bookmarks", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ep-1234").not());
}

#[test]
fn removing_unknown_bookmark_fails() {
    let home = TempDir::new().unwrap();
    globus(&home)
        .args(["bookmarks", "rm", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no bookmark named 'nope'"));
}

#[test]
fn settings_flag_overrides_environment() {
    let home = TempDir::new().unwrap();
    let other = home.path().join("other.toml");

    globus(&home)
        .args(["--settings", other.to_str().unwrap()])
        .args(["bookmarks", "add", "cluster", "ep-9"])
        .assert()
        .success();

    assert!(other.exists());
    assert!(!home.path().join("settings.toml").exists());
}

#[test]
fn malformed_transfer_spec_is_rejected_before_login() {
    let home = TempDir::new().unwrap();
    globus(&home)
        .args(["transfer", "src", "dst", "/a/:/b"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("invalid transfer specification")
                .and(predicate::str::contains("not logged in").not()),
        );
}

#[test]
fn remote_command_needs_login() {
    let home = TempDir::new().unwrap();
    globus(&home)
        .args(["info", "ep-1234"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not logged in"));
}

#[test]
fn submit_description_runs_transfer_as_globus_job() {
    let home = TempDir::new().unwrap();
    globus(&home)
        .args([
            "transfer",
            "src",
            "dst",
            "/data/in/:/data/out/",
            "--label",
            "nightly",
            "--as-submit-description",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("universe = local")
                .and(predicate::str::contains("+IsGlobusJob = True"))
                .and(predicate::str::contains("on_exit_hold = ExitCode == 2"))
                .and(predicate::str::contains("transfer src dst /data/in/:/data/out/"))
                .and(predicate::str::contains("--wait"))
                .and(predicate::str::contains("log = nightly.log")),
        );
}

#[test]
fn zero_poll_interval_is_rejected() {
    let home = TempDir::new().unwrap();
    globus(&home)
        .args(["wait", "t1", "--interval", "0"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("--interval")
                .and(predicate::str::contains("not logged in").not()),
        );
}

#[test]
fn zero_attempt_timeout_is_rejected() {
    let home = TempDir::new().unwrap();
    globus(&home)
        .args(["transfer", "src", "dst", "/a:/b", "--wait", "--timeout", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--timeout"));
}
