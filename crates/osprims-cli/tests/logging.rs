use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;

#[test]
fn text_logs_go_to_stderr() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args(["--log-format", "text", "--log-level", "info"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Platform:"))
        .stderr(predicate::str::contains("INFO"))
        .stderr(predicate::str::contains("Initialization complete"))
        .stderr(predicate::str::contains("Main logic finished"));
}

#[test]
fn json_logs_are_one_object_per_line() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args(["--log-format", "json", "--log-level", "info"]);

    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let lines: Vec<Value> = stderr
        .lines()
        .map(|line| serde_json::from_str(line).expect("stderr line should be valid JSON"))
        .collect();

    let messages: Vec<&str> = lines
        .iter()
        .map(|line| line["fields"]["message"].as_str().unwrap())
        .collect();
    assert_eq!(
        messages,
        [
            "Initialization complete. Starting main logic.",
            "Main logic finished."
        ]
    );
    assert!(lines.iter().all(|line| line["level"] == "INFO"));
}

#[test]
fn debug_level_shows_library_events() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args(["--log-level", "debug", "classify", "1000000"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("not claimed by any candidate domain"));
}

#[test]
fn log_level_from_env() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.env("OSPRIMS_LOG_LEVEL", "error");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Initialization complete").not())
        .stdout(predicate::str::contains("Platform:"));
}
