use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn tw_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tw");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/tw.sqlite"

[completion]
provider = "disabled"

[scheduler]
retention_days = 30
"#,
        root.display()
    );

    let config_path = config_dir.join("tw.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_tw(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = tw_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run tw binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_tw(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_tw(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_tw(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_tenders_empty_listing() {
    let (_tmp, config_path) = setup_test_env();

    run_tw(&config_path, &["init"]);
    let (stdout, stderr, success) = run_tw(&config_path, &["tenders"]);
    assert!(
        success,
        "tenders failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("0 tender(s)"));
}

#[test]
fn test_analyze_unknown_tender_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_tw(&config_path, &["init"]);
    let (_, stderr, success) = run_tw(&config_path, &["analyze", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        "[db]\npath = \"/tmp/x.sqlite\"\n[completion]\nprovider = \"g4f\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_tw(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Unknown completion provider"));
}
