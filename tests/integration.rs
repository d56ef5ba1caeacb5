//! CLI tests driving the `dpra` binary.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const KEY_VAR: &str = "DPRA_INTEGRATION_TEST_KEY";

fn dpra_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dpra");
    path
}

fn setup_test_env(endpoint: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();

    fs::write(
        files_dir.join("ring-road.docx"),
        common::docx_with_paragraphs(&["Nagpur ring road", "Estimated cost 450 crore"]),
    )
    .unwrap();
    fs::write(files_dir.join("costs.xlsx"), common::xlsx_cost_sheet()).unwrap();
    fs::write(files_dir.join("notes.txt"), "plain notes").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/dpra.sqlite"

[inference]
endpoint = "{}"
api_key_env = "{}"

[pipeline]
deadline_secs = 30
initial_status = "Completed"
"#,
        root.display(),
        endpoint,
        KEY_VAR
    );

    let config_path = config_dir.join("dpra.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dpra(config_path: &Path, args: &[&str], api_key: Option<&str>) -> (String, String, bool) {
    let binary = dpra_binary();
    let mut command = Command::new(&binary);
    command
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove(KEY_VAR);
    if let Some(key) = api_key {
        command.env(KEY_VAR, key);
    }
    let output = command
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dpra binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .join(name)
        .display()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let (stdout, stderr, success) = run_dpra(&config_path, &["init"], None);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data").join("dpra.sqlite").exists());

    // Idempotent
    let (_, _, success) = run_dpra(&config_path, &["init"], None);
    assert!(success);
}

#[test]
fn test_extract_docx_json() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let docx = file(&config_path, "ring-road.docx");
    let (stdout, stderr, success) = run_dpra(&config_path, &["extract", &docx, "--json"], None);
    assert!(success, "extract failed: {}", stderr);

    let out: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(out["method"], "docx");
    assert_eq!(out["truncated"], false);
    assert_eq!(out["text"], "Nagpur ring road\nEstimated cost 450 crore\n");
    assert_eq!(out["sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn test_extract_xlsx_prints_rows() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let xlsx = file(&config_path, "costs.xlsx");
    let (stdout, _, success) = run_dpra(&config_path, &["extract", &xlsx], None);
    assert!(success);
    assert!(stdout.contains("\"Earthwork\""));
    assert!(!stdout.contains("wrong sheet"));
}

#[test]
fn test_extract_unsupported_type_fails() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let txt = file(&config_path, "notes.txt");
    let (_, stderr, success) = run_dpra(&config_path, &["extract", &txt], None);
    assert!(!success);
    assert!(stderr.contains("unsupported content-type"), "stderr: {}", stderr);
}

#[test]
fn test_extract_without_config_file_uses_defaults() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let docx = file(&config_path, "ring-road.docx");
    let missing = tmp.path().join("config").join("absent.toml");
    let (stdout, stderr, success) = run_dpra(&missing, &["extract", &docx, "--json"], None);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("Nagpur ring road"));
}

#[test]
fn test_extract_reports_invalid_config() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    fs::write(&config_path, "[db]\npath = \"x\"\n[extraction]\nmax_chars = 0\n").unwrap();
    let docx = file(&config_path, "ring-road.docx");
    let (_, stderr, success) = run_dpra(&config_path, &["extract", &docx], None);
    assert!(!success);
    assert!(stderr.contains("max_chars"), "stderr: {}", stderr);
}

#[test]
fn test_analyze_without_credential_fails_before_any_call() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let docx = file(&config_path, "ring-road.docx");
    let (_, stderr, success) = run_dpra(
        &config_path,
        &["analyze", &docx, "--project", "ring-road"],
        None,
    );
    assert!(!success);
    assert!(stderr.contains(KEY_VAR), "stderr: {}", stderr);
}

#[test]
fn test_analyze_rejects_unknown_task() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let docx = file(&config_path, "ring-road.docx");
    let (_, stderr, success) = run_dpra(
        &config_path,
        &["analyze", &docx, "--project", "p", "--tasks", "summarize,poetry"],
        Some("k"),
    );
    assert!(!success);
    assert!(stderr.contains("unknown analysis task"), "stderr: {}", stderr);
}

#[test]
fn test_get_missing_report() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let (_, stderr, success) = run_dpra(&config_path, &["get", "nope"], None);
    assert!(!success);
    assert!(stderr.contains("report not found"));
}

#[test]
fn test_list_empty() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let (stdout, _, success) = run_dpra(&config_path, &["list"], None);
    assert!(success);
    assert!(stdout.contains("No reports found."));
}

#[test]
fn test_completions() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/v1/chat/completions");
    let (stdout, _, success) = run_dpra(&config_path, &["completions", "bash"], None);
    assert!(success);
    assert!(stdout.contains("dpra"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_analyze_save_list_get_chat() {
    let mock = common::spawn_mock_endpoint(common::MockState::default()).await;
    let (_tmp, config_path) = setup_test_env(&mock.url);
    let docx = file(&config_path, "ring-road.docx");

    let cfg = config_path.clone();
    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run_dpra(
            &cfg,
            &["analyze", &docx, "--project", "ring-road"],
            Some("secret"),
        )
    })
    .await
    .unwrap();
    assert!(success, "analyze failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["status"], "Completed");
    assert_eq!(report["extractionMethod"], "docx");
    let id = report["id"].as_str().unwrap().to_string();

    assert_eq!(mock.requests().len(), 4);
    assert!(mock
        .requests()
        .iter()
        .all(|r| r.authorization.as_deref() == Some("Bearer secret")));

    let cfg = config_path.clone();
    let (listing, _, success) = tokio::task::spawn_blocking(move || {
        run_dpra(&cfg, &["list", "--project", "ring-road", "--status", "completed"], None)
    })
    .await
    .unwrap();
    assert!(success);
    assert!(listing.contains(&id));
    assert!(listing.contains("ring-road.docx"));

    let cfg = config_path.clone();
    let get_id = id.clone();
    let (stored, _, success) =
        tokio::task::spawn_blocking(move || run_dpra(&cfg, &["get", &get_id], None))
            .await
            .unwrap();
    assert!(success);
    let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored, report);

    let cfg = config_path.clone();
    let (answer, stderr, success) = tokio::task::spawn_blocking(move || {
        run_dpra(&cfg, &["chat", &id, "What does it cost?"], Some("secret"))
    })
    .await
    .unwrap();
    assert!(success, "chat failed: {}", stderr);
    assert!(answer.contains("450 crore"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_analyze_no_save_skips_store() {
    let mock = common::spawn_mock_endpoint(common::MockState::default()).await;
    let (_tmp, config_path) = setup_test_env(&mock.url);
    let docx = file(&config_path, "ring-road.docx");

    let cfg = config_path.clone();
    let (_, stderr, success) = tokio::task::spawn_blocking(move || {
        run_dpra(
            &cfg,
            &["analyze", &docx, "--project", "p", "--tasks", "summarize", "--no-save"],
            Some("secret"),
        )
    })
    .await
    .unwrap();
    assert!(success, "analyze failed: {}", stderr);
    assert_eq!(mock.requests().len(), 1);

    let (listing, _, _) = run_dpra(&config_path, &["list"], None);
    assert!(listing.contains("No reports found."));
}
