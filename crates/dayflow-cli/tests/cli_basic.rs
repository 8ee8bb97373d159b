//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against the dev data
//! directory and verify exit codes and JSON output shapes.

use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "dayflow-cli", "--quiet", "--"])
        .args(args)
        .env("DAYFLOW_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_task_add_and_list() {
    // A per-test user keeps parallel tests from seeing each other's rows.
    let user = format!("cli-user-{}", std::process::id());

    let (stdout, stderr, code) = run_cli(&[
        "task",
        "add",
        "Write quarterly report",
        "--user",
        &user,
        "--priority",
        "high",
        "--estimate-minutes",
        "90",
    ]);
    assert_eq!(code, 0, "task add failed: {stderr}");
    let created: serde_json::Value = serde_json::from_str(&stdout).expect("task add emits JSON");
    assert_eq!(created["title"], "Write quarterly report");
    assert_eq!(created["priority"], "high");

    let (stdout, stderr, code) = run_cli(&["task", "list", "--user", &user]);
    assert_eq!(code, 0, "task list failed: {stderr}");
    let tasks: serde_json::Value = serde_json::from_str(&stdout).expect("task list emits JSON");
    let tasks = tasks.as_array().expect("task list emits a JSON array");
    assert!(tasks.iter().any(|t| t["id"] == created["id"]));
}

#[test]
fn test_schedule_preview_shape() {
    let user = format!("cli-preview-{}", std::process::id());
    let _ = run_cli(&[
        "task",
        "add",
        "Preview me",
        "--user",
        &user,
        "--estimate-minutes",
        "30",
    ]);

    let (stdout, stderr, code) = run_cli(&[
        "schedule", "preview", "--user", &user, "--date", "2024-06-10",
    ]);
    assert_eq!(code, 0, "schedule preview failed: {stderr}");
    let result: serde_json::Value = serde_json::from_str(&stdout).expect("preview emits JSON");
    assert!(result["blocks"].is_array());
    assert!(result["capacity_usage"].as_f64().unwrap() <= 1.0);
    assert_eq!(result["window_minutes"], 480);
}

#[test]
fn test_schedule_preview_rejects_malformed_date() {
    let (_, stderr, code) = run_cli(&[
        "schedule", "preview", "--user", "u1", "--date", "10/06/2024",
    ]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid date"), "stderr was: {stderr}");
}

#[test]
fn test_review_compute() {
    let user = format!("cli-review-{}", std::process::id());
    let (stdout, stderr, code) = run_cli(&[
        "review", "compute", "--user", &user, "--date", "2024-06-10",
    ]);
    assert_eq!(code, 0, "review compute failed: {stderr}");
    let review: serde_json::Value = serde_json::from_str(&stdout).expect("review emits JSON");
    let score = review["productivity_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));
}

#[test]
fn test_review_insights_empty_without_history() {
    let user = format!("cli-insights-{}", std::process::id());
    let (stdout, stderr, code) = run_cli(&["review", "insights", "--user", &user]);
    assert_eq!(code, 0, "review insights failed: {stderr}");
    assert_eq!(stdout.trim(), "{}");
}
