//! CLI contract tests. Each test points the binary at a throwaway config
//! and database so nothing touches the real home directory.

use assert_cmd::Command;
use tempfile::TempDir;

fn skymate(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("skymate").expect("binary should build");
    cmd.env("SKYMATE_CONFIG_PATH", dir.path().join("config.toml"))
        .env("SKYMATE_DB_PATH", dir.path().join("skymate.db"))
        .env("RUST_LOG", "error");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("command should run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn extract_resolves_contradiction_to_avoidance() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = stdout_of(skymate(&dir).args([
        "extract",
        "I hate morning flights but I love morning flights",
    ]));
    assert!(out.contains("departure_time: Avoid morning flights"), "{out}");
    assert!(!out.contains("departure_time: Morning flights"), "{out}");
}

#[test]
fn extract_marks_transient_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = stdout_of(skymate(&dir).args(["extract", "show me cheap flights"]));
    assert!(out.contains("budget: Budget conscious  (transient)"), "{out}");
}

#[test]
fn remember_then_list_and_forget() {
    let dir = tempfile::tempdir().expect("tempdir");

    let out = stdout_of(skymate(&dir).args(["remember", "I prefer business class"]));
    assert!(out.contains("I'll remember: Cabin class: Business"), "{out}");

    let out = stdout_of(skymate(&dir).args(["prefs"]));
    assert!(out.contains("Cabin class: Business"), "{out}");

    stdout_of(skymate(&dir).args(["forget", "--category", "cabin_class"]));
    let out = stdout_of(skymate(&dir).args(["prefs"]));
    assert!(out.contains("No stored preferences."), "{out}");
}

#[test]
fn plan_applies_stored_cabin() {
    let dir = tempfile::tempdir().expect("tempdir");
    stdout_of(skymate(&dir).args(["remember", "first class please"]));

    let out = stdout_of(skymate(&dir).args([
        "plan",
        "--origin",
        "jfk",
        "--destination",
        "lax",
        "--date",
        "2026-11-02",
    ]));
    assert!(out.contains("FIRST"), "{out}");
    assert!(out.contains("JFK"), "{out}");
}

#[test]
fn users_are_isolated() {
    let dir = tempfile::tempdir().expect("tempdir");
    stdout_of(skymate(&dir).args(["--user", "alice", "remember", "window seat"]));

    let out = stdout_of(skymate(&dir).args(["--user", "bob", "prefs"]));
    assert!(out.contains("No stored preferences."), "{out}");
}
