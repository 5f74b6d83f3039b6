use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

const EXPORT: &str = r#"
bugs:
  - id: 1
    summary: Crash on save
    status: NEW
    severity: critical
    comments:
      - author: alice@example.org
        created: 2003-04-05 10:11:12 +0000
        text: It crashes.
  - id: 4
    summary: Menu typo
    status: RESOLVED
    resolution: FIXED
    priority: P3
"#;

fn run_port(dir: &Path, args: &[&str]) -> Output {
    let binary = assert_cmd::cargo::cargo_bin!("trackport");
    let mut cmd = Command::new(binary);
    cmd.current_dir(dir);
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("GITHUB_TOKEN");
    cmd.args(args);
    cmd.output().expect("trackport command executes")
}

fn run_port_ok(dir: &Path, args: &[&str]) -> Output {
    let output = run_port(dir, args);
    assert!(
        output.status.success(),
        "trackport {:?} failed:\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn run_port_json(dir: &Path, args: &[&str]) -> Value {
    let output = run_port_ok(dir, args);
    serde_json::from_slice(&output.stdout).expect("valid json stdout")
}

fn write_export(dir: &Path) {
    fs::write(dir.join("export.yaml"), EXPORT).unwrap();
}

fn read_snapshot(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).expect("snapshot is json")
}

fn actions(report: &Value) -> Vec<(u64, String)> {
    report["decisions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| {
            (
                d["slot"].as_u64().unwrap(),
                d["action"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[test]
fn migrate_defaults_to_dry_run() {
    let dir = tempdir().unwrap();
    write_export(dir.path());

    let output = run_port_ok(
        dir.path(),
        &["migrate", "--export", "export.yaml", "--local", "dest.json"],
    );
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(report["dry_run"], true);
    assert_eq!(report["records"], 2);
    assert_eq!(
        actions(&report),
        vec![
            (1, "created".to_string()),
            (2, "placeholder".to_string()),
            (3, "placeholder".to_string()),
            (4, "created".to_string()),
        ]
    );
    assert!(!dir.path().join("dest.json").exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("dry run: skipping").count(), 1, "{stderr}");
}

#[test]
fn forced_migrate_writes_and_second_run_only_reconciles() {
    let dir = tempdir().unwrap();
    write_export(dir.path());
    let args = [
        "migrate",
        "--export",
        "export.yaml",
        "--local",
        "dest.json",
        "--force",
        "--grace",
        "0",
    ];

    let first = run_port_json(dir.path(), &args);
    assert_eq!(first["dry_run"], false);
    assert_eq!(first["summary"]["created"], 2);
    assert_eq!(first["summary"]["placeholders"], 2);

    let snapshot = read_snapshot(&dir.path().join("dest.json"));
    let issues = snapshot["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 4);
    assert_eq!(issues[0]["title"], "Crash on save");
    assert_eq!(issues[0]["labels"], serde_json::json!(["severity:critical"]));
    assert!(
        issues[0]["body"]
            .as_str()
            .unwrap()
            .ends_with("[trackport:v1] imported record #1")
    );
    assert_eq!(issues[1]["state"], "closed");
    assert_eq!(issues[3]["state"], "closed");

    let second = run_port_json(dir.path(), &args);
    assert_eq!(second["summary"]["created"], 0);
    assert_eq!(second["summary"]["reconciled"], 2);
    let snapshot = read_snapshot(&dir.path().join("dest.json"));
    assert_eq!(snapshot["issues"].as_array().unwrap().len(), 4);
}

#[test]
fn migrate_renumbers_around_a_foreign_issue() {
    let dir = tempdir().unwrap();
    write_export(dir.path());
    fs::write(
        dir.path().join("dest.json"),
        r#"{"issues": [{"number": 1, "title": "Hand-made", "body": "not ours"}]}"#,
    )
    .unwrap();

    let report = run_port_json(
        dir.path(),
        &[
            "migrate", "--export", "export.yaml", "--local", "dest.json", "--force", "--grace",
            "0",
        ],
    );
    assert_eq!(report["summary"]["renumbered"], 1);

    let snapshot = read_snapshot(&dir.path().join("dest.json"));
    let first = &snapshot["issues"][0];
    assert_eq!(first["title"], "Hand-made");
    assert_eq!(
        first["comments"][0]["body"],
        "[trackport:v1] record 1 moved to #2"
    );
}

#[test]
fn export_from_stdin_with_minimal_output() {
    let dir = tempdir().unwrap();
    let binary = assert_cmd::cargo::cargo_bin!("trackport");

    let output = assert_cmd::Command::new(binary)
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .args([
            "--format",
            "minimal",
            "migrate",
            "--export",
            "-",
            "--local",
            "dest.json",
        ])
        .write_stdin(EXPORT)
        .output()
        .expect("trackport command executes");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.starts_with("migrate dry-run records=2 created=2"),
        "{stdout}"
    );
}

#[test]
fn copy_between_snapshots() {
    let dir = tempdir().unwrap();
    write_export(dir.path());
    run_port_ok(
        dir.path(),
        &[
            "migrate", "--export", "export.yaml", "--local", "a.json", "--force", "--grace", "0",
        ],
    );

    let report = run_port_json(
        dir.path(),
        &[
            "copy",
            "--from-local",
            "a.json",
            "--to-local",
            "b.json",
            "--force",
            "--grace",
            "0",
        ],
    );
    assert_eq!(report["created"], 4);

    let a = read_snapshot(&dir.path().join("a.json"));
    let b = read_snapshot(&dir.path().join("b.json"));
    assert_eq!(a["issues"], b["issues"]);
}

#[test]
fn missing_destination_prints_usage() {
    let dir = tempdir().unwrap();
    write_export(dir.path());
    let binary = assert_cmd::cargo::cargo_bin!("trackport");

    assert_cmd::Command::new(binary)
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .args(["migrate", "--export", "export.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"))
        .stderr(predicate::str::contains("--repo"));
}

#[test]
fn remote_destination_without_token_fails() {
    let dir = tempdir().unwrap();
    write_export(dir.path());

    let output = run_port(
        dir.path(),
        &["migrate", "--export", "export.yaml", "--repo", "octo/demo"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let error: Value = serde_json::from_str(stderr.trim()).expect("json error on stderr");
    assert_eq!(error["error"], "missing_credential");
}

#[test]
fn invalid_export_is_reported_in_pretty_format() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("export.yaml"), "bugs: []\n").unwrap();

    let output = run_port(
        dir.path(),
        &[
            "--pretty",
            "migrate",
            "--export",
            "export.yaml",
            "--local",
            "dest.json",
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: invalid export"), "{stderr}");
}
