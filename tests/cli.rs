//! Integration tests for the `smartdoc` binary.
//!
//! Each test writes an offline config (hash embeddings, no reranker) into a
//! temp dir and runs the compiled binary against files created there.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn smartdoc_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_smartdoc"))
}

fn setup() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("smartdoc.toml");
    fs::write(
        &config_path,
        r#"[embedding]
provider = "hash"

[rerank]
enabled = false

[retrieval]
search_k = 5
top_n = 2
"#,
    )
    .unwrap();
    (tmp, config_path)
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(smartdoc_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run smartdoc")
}

#[test]
fn test_ingest_reports_documents_and_chunks() {
    let (tmp, config) = setup();
    let notes = tmp.path().join("notes.txt");
    fs::write(&notes, "First line.\n\nSecond paragraph.").unwrap();
    let table = tmp.path().join("table.csv");
    fs::write(&table, "a,b").unwrap();

    let output = run(
        &config,
        &["ingest", notes.to_str().unwrap(), table.to_str().unwrap()],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("notes.txt: 1 documents, 1 chunks"), "{}", stdout);
    assert!(stdout.contains("table.csv: unsupported file format: .csv"), "{}", stdout);
}

#[test]
fn test_retrieve_prints_ranked_chunks() {
    let (tmp, config) = setup();
    let sky = tmp.path().join("sky.txt");
    fs::write(&sky, "The sky is blue. Grass is green.").unwrap();

    let output = run(
        &config,
        &["retrieve", "-f", sky.to_str().unwrap(), "What color is the sky?"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("1. ["), "{}", stdout);
    assert!(stdout.contains("sky.txt"));
    assert!(stdout.contains("The sky is blue."));
}

#[test]
fn test_ask_without_generation_prints_prompt() {
    let (_tmp, config) = setup();
    let output = run(
        &config,
        &[
            "ask",
            "--text",
            "The launch is scheduled for March.",
            "--no-generate",
            "When",
            "is",
            "the",
            "launch?",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Context:\nThe launch is scheduled for March."));
    assert!(stdout.contains("Question:\nWhen is the launch?"));
}

#[test]
fn test_no_input_fails() {
    let (_tmp, config) = setup();
    let output = run(&config, &["retrieve", "anything"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no input"), "{}", stderr);
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let notes = tmp.path().join("notes.txt");
    fs::write(&notes, "hello").unwrap();
    let output = run(
        &tmp.path().join("absent.toml"),
        &["ingest", notes.to_str().unwrap()],
    );
    assert!(output.status.success());
}
