use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;

/// EACCES resolves to Permission when Path is tried first.
#[test]
#[cfg(unix)]
fn classify_eacces_as_permission() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args([
        "--log-level",
        "error",
        "classify",
        "13",
        "--domains",
        "path,permission,descriptor",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("permission: permission denied"));
}

/// The same code reads as contention when Lock leads the cascade.
#[test]
#[cfg(unix)]
fn classify_eacces_as_contention_when_lock_first() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args([
        "--log-level",
        "error",
        "classify",
        "13",
        "--domains",
        "lock,permission",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("lock: lock held by another owner"));
}

#[test]
fn classify_unknown_code_prints_raw_code() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args(["--log-level", "error", "classify", "999999"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("unmapped"))
        .stdout(predicate::str::contains("999999"));
}

#[test]
fn classify_foreign_platform_is_unmapped() {
    let foreign = if cfg!(windows) { "posix" } else { "windows" };

    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args([
        "--log-level",
        "error",
        "classify",
        "2",
        "--platform",
        foreign,
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(format!("unmapped {foreign} 2")));
}

#[test]
fn classify_json_output() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args([
        "--log-level",
        "error",
        "classify",
        "2",
        "--domains",
        "path",
        "--json",
    ]);

    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(
        json["schema_id"],
        "https://schemas.3leaps.dev/osprims/errors/v1.0.0/classify-result.schema.json"
    );
    assert!(json["timestamp"].as_str().is_some_and(|ts| ts.contains('T')));
    assert_eq!(json["code"], 2);
    assert_eq!(json["domains"], serde_json::json!(["path"]));
    // ENOENT and ERROR_FILE_NOT_FOUND are both 2.
    assert_eq!(json["domain"], "path");
    assert_eq!(json["unmapped"], false);
}

#[test]
fn classify_rejects_unknown_domain() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args(["classify", "13", "--domains", "socket"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown error domain 'socket'"));
}

#[test]
fn classify_rejects_out_of_range_code() {
    let mut cmd = cargo_bin_cmd!("osprims");
    cmd.args([
        "--log-level",
        "error",
        "classify",
        "-1",
        "--platform",
        "windows",
    ]);

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("out of range"));
}
