use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ragloop_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ragloop"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Create test files
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("leave.md"),
        "# Leave Policy\n\nPolicy: 30 days of leave after 12 months.",
    )
    .unwrap();
    fs::write(
        files_dir.join("expenses.txt"),
        "Expense reports are approved by your line manager.",
    )
    .unwrap();

    let config_content = format!(
        r#"[vector_store]
path = "{}/data/ragloop.sqlite"
collection = "handbook"

[chunking]
chunk_size = 500
chunk_overlap = 50

[retrieval]
rerank_k = 3

[logging]
level = "warn"
"#,
        root.display()
    );

    let config_path = config_dir.join("ragloop.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ragloop(config_path: &Path, args: &[&str], api_key: Option<&str>) -> (String, String, bool) {
    let binary = ragloop_binary();
    let mut command = Command::new(&binary);
    command
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG");
    match api_key {
        Some(key) => command.env("OPENAI_API_KEY", key),
        None => command.env_remove("OPENAI_API_KEY"),
    };

    let output = command
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragloop binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragloop(&config_path, &["init"], None);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/ragloop.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_ragloop(&config_path, &["init"], None);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_ragloop(&config_path, &["init"], None);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_stats_on_empty_store() {
    let (_tmp, config_path) = setup_test_env();

    run_ragloop(&config_path, &["init"], None);
    let (stdout, stderr, success) = run_ragloop(&config_path, &["stats"], None);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("handbook"));
    assert!(stdout.contains("Chunks:      0"));
}

#[test]
fn test_ask_without_api_key_fails() {
    let (tmp, config_path) = setup_test_env();
    let docs = tmp.path().join("files");

    let (_, stderr, success) = run_ragloop(
        &config_path,
        &["ask", "How many days of leave?", "--docs", docs.to_str().unwrap()],
        None,
    );
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_ask_with_missing_docs_path_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nope");

    let (_, stderr, success) = run_ragloop(
        &config_path,
        &["ask", "anything", "--docs", missing.to_str().unwrap()],
        Some("sk-test"),
    );
    assert!(!success);
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_fails() {
    let (tmp, _) = setup_test_env();
    let bad_config = tmp.path().join("config/bad.toml");
    fs::write(&bad_config, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

    let (_, stderr, success) = run_ragloop(&bad_config, &["init"], None);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_unparseable_config_fails() {
    let (tmp, _) = setup_test_env();
    let bad_config = tmp.path().join("config/broken.toml");
    fs::write(&bad_config, "[retrieval\nrerank_k = ").unwrap();

    let (_, stderr, success) = run_ragloop(&bad_config, &["stats"], None);
    assert!(!success);
    assert!(stderr.contains("Failed to parse config file"), "stderr: {}", stderr);
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(ragloop_binary())
        .arg("--help")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for command in ["init", "ask", "search", "serve", "stats"] {
        assert!(stdout.contains(command), "missing {} in help", command);
    }
}
