use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn moon() -> Command {
    let mut cmd = Command::cargo_bin("moon").expect("moon binary");
    cmd.env_remove("RUST_LOG").env_remove("MOON_LOG_FORMAT");
    cmd
}

#[test]
fn invalid_poll_interval_is_a_setup_failure() {
    moon()
        .env("MOON_POLL_INTERVAL_SECS", "soon")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid daemon settings"))
        .stderr(predicate::str::contains("MOON_POLL_INTERVAL_SECS"));
}

#[test]
fn zero_clone_attempts_is_rejected() {
    moon()
        .env("MOON_CLONE_ATTEMPTS", "0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MOON_CLONE_ATTEMPTS"));
}

#[cfg(unix)]
#[test]
fn unusable_apps_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();

    moon()
        .env("MOON_CONFIG_FILE", dir.path().join("configuration.yml"))
        .env("MOON_APPS_ROOT", blocker.join("repository"))
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .failure()
        .stderr(predicate::str::contains("moon daemon exited with an error"));
}
