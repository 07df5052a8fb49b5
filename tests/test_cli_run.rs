use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_missing_config_file_is_rejected() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let mut cmd = assert_cmd::cargo_bin_cmd!("locker");
    cmd.arg("--config").arg(&missing).arg("run");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_invalid_interval_in_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[guard]\npoll_interval_ms = 1\n").unwrap();

    let mut cmd = assert_cmd::cargo_bin_cmd!("locker");
    cmd.arg("--config").arg(&path).arg("run");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid polling interval"));
}

#[test]
fn test_malformed_protect_flag_is_rejected() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("locker");
    cmd.args(["run", "--protect", "notepad.exe"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("NAME=PASSWORD"));
}

#[cfg(unix)]
#[test]
fn test_console_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[guard]\npoll_interval_ms = 50\n\n[programs]\n\"Notepad.exe\" = \"pw1\"\n").unwrap();

    let mut cmd = assert_cmd::cargo_bin_cmd!("locker");
    cmd.arg("--config")
        .arg(&path)
        .arg("run")
        .write_stdin("protected\nunlock wrong\nquit\n")
        .timeout(std::time::Duration::from_secs(20));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("locker is running"))
        .stdout(predicate::str::contains("notepad.exe"))
        .stdout(predicate::str::contains("Wrong password"))
        .stdout(predicate::str::contains("pw1").not());
}
