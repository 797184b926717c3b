use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn version_prints() {
    let mut cmd = Command::cargo_bin("excap").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("excap"));
}

#[test]
fn help_lists_top_level_commands() {
    let mut cmd = Command::cargo_bin("excap").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("trace"))
        .stdout(predicate::str::contains("checkpoint"))
        .stdout(predicate::str::contains("phase"));
}

#[test]
fn init_creates_workspace_directories() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("excap").unwrap();
    cmd.arg("--path")
        .arg(dir.path())
        .arg("init")
        .assert()
        .success();

    assert!(dir.path().join("artifacts").is_dir());
    assert!(dir.path().join("traces.db").is_file());
}

#[test]
fn trace_start_then_show_round_trips() {
    let dir = TempDir::new().unwrap();

    let start_output = Command::cargo_bin("excap")
        .unwrap()
        .arg("--path")
        .arg(dir.path())
        .arg("trace")
        .arg("start")
        .output()
        .unwrap();
    assert!(start_output.status.success());
    let trace_id = String::from_utf8(start_output.stdout).unwrap().trim().to_string();
    assert!(trace_id.starts_with("trace-"));

    Command::cargo_bin("excap")
        .unwrap()
        .arg("--path")
        .arg(dir.path())
        .arg("trace")
        .arg("show")
        .arg(&trace_id)
        .assert()
        .success()
        .stdout(predicate::str::contains(trace_id));
}

#[test]
fn trace_recover_on_a_clean_trace_finds_nothing_to_recover() {
    let dir = TempDir::new().unwrap();
    let start_output = Command::cargo_bin("excap")
        .unwrap()
        .arg("--path")
        .arg(dir.path())
        .arg("trace")
        .arg("start")
        .output()
        .unwrap();
    let trace_id = String::from_utf8(start_output.stdout).unwrap().trim().to_string();

    Command::cargo_bin("excap")
        .unwrap()
        .arg("--path")
        .arg(dir.path())
        .arg("trace")
        .arg("recover")
        .arg(&trace_id)
        .assert()
        .success()
        .stdout(predicate::str::contains("no dangling spans"));
}

#[test]
fn phase_status_is_idempotent_after_checkpoint_create() {
    let dir = TempDir::new().unwrap();
    let start_output = Command::cargo_bin("excap")
        .unwrap()
        .arg("--path")
        .arg(dir.path())
        .arg("trace")
        .arg("start")
        .output()
        .unwrap();
    let trace_id = String::from_utf8(start_output.stdout).unwrap().trim().to_string();

    Command::cargo_bin("excap")
        .unwrap()
        .arg("--path")
        .arg(dir.path())
        .arg("checkpoint")
        .arg("create")
        .arg(&trace_id)
        .arg("--step")
        .arg("0")
        .arg("--description")
        .arg("initial")
        .assert()
        .success();

    for _ in 0..2 {
        Command::cargo_bin("excap")
            .unwrap()
            .arg("--path")
            .arg(dir.path())
            .arg("phase")
            .arg("status")
            .arg(&trace_id)
            .assert()
            .success()
            .stdout(predicate::str::contains("Localization"));
    }
}

#[test]
fn trace_show_on_unknown_id_reports_empty_session() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("excap")
        .unwrap()
        .arg("--path")
        .arg(dir.path())
        .arg("trace")
        .arg("show")
        .arg("trace-0000000000000000")
        .assert()
        .success()
        .stdout(predicate::str::contains("Empty"));
}
