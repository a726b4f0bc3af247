#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "hostlink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn hostlink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hostlink"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("hostlink should run")
}

#[test]
fn replay_reports_each_dispatch_outcome() {
    let dir = unique_temp_dir("replay");
    let events = dir.join("events.jsonl");
    std::fs::write(
        &events,
        [
            r#"{"origin":"https://host.example.com","data":"{\"id\":1,\"args\":[\"ok\"]}"}"#,
            r#"{"origin":"https://evil.test","data":"{\"id\":2,\"args\":[]}"}"#,
            r#"{"origin":"https://eu.example.com","data":{"func":"themeChange","args":["dark"]}}"#,
            "",
            r#"{"origin":"https://host.example.com","data":{"func":"nobody","args":[]}}"#,
        ]
        .join("\n"),
    )
    .expect("events should be writable");

    let output = hostlink(&[
        "--format",
        "json",
        "replay",
        events.to_str().expect("utf-8 path"),
        "--topology",
        "framed",
        "--origin",
        "https://host.example.com",
        "--allow-origin",
        "https://*.example.com",
        "--pending",
        "2",
        "--handler",
        "themeChange",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each row should be JSON"))
        .collect();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["outcome"], "settled");
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[1]["outcome"], "filtered");
    assert_eq!(rows[2]["outcome"], "handled");
    assert_eq!(rows[2]["event"], "themeChange");
    assert_eq!(rows[3]["outcome"], "dropped");
    assert_eq!(rows[3]["line"], 5);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn replay_framed_without_origin_is_usage_error() {
    let dir = unique_temp_dir("replay-usage");
    let events = dir.join("events.jsonl");
    std::fs::write(&events, "").expect("events should be writable");

    let output = hostlink(&[
        "replay",
        events.to_str().expect("utf-8 path"),
        "--topology",
        "framed",
    ]);

    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn replay_malformed_line_returns_60() {
    let dir = unique_temp_dir("replay-invalid");
    let events = dir.join("events.jsonl");
    std::fs::write(&events, "{not json}\n").expect("events should be writable");

    let output = hostlink(&["replay", events.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(60));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reassemble_writes_payload() {
    let dir = unique_temp_dir("reassemble");
    let chunks = dir.join("chunks.jsonl");
    let out = dir.join("media.bin");
    std::fs::write(
        &chunks,
        [
            r#"{"mediaChunk":{"chunk":"aGVs","chunkSequence":3}}"#,
            r#"{"mediaChunk":{"chunk":"bG8g","chunkSequence":2}}"#,
            r#"{"mediaChunk":{"chunk":"d29y","chunkSequence":1}}"#,
            r#"{"mediaChunk":{"chunk":"bGQ=","chunkSequence":0}}"#,
        ]
        .join("\n"),
    )
    .expect("chunks should be writable");

    let output = hostlink(&[
        "--format",
        "json",
        "reassemble",
        chunks.to_str().expect("utf-8 path"),
        "--out",
        out.to_str().expect("utf-8 path"),
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(std::fs::read(&out).expect("output should exist"), b"hello world");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"chunks\":4"));
    assert!(stdout.contains("\"bytes\":11"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reassemble_host_error_fails_without_output() {
    let dir = unique_temp_dir("reassemble-error");
    let chunks = dir.join("chunks.jsonl");
    let out = dir.join("media.bin");
    std::fs::write(
        &chunks,
        [
            r#"{"mediaChunk":{"chunk":"aGVs","chunkSequence":2}}"#,
            r#"{"error":{"errorCode":500,"message":"storage unavailable"}}"#,
        ]
        .join("\n"),
    )
    .expect("chunks should be writable");

    let output = hostlink(&[
        "reassemble",
        chunks.to_str().expect("utf-8 path"),
        "--out",
        out.to_str().expect("utf-8 path"),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("storage unavailable"));
    assert!(!out.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_input_file_returns_64() {
    let output = hostlink(&["reassemble", "/nonexistent/hostlink/chunks.jsonl", "--out", "x.bin"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_crate_version() {
    let output = hostlink(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("hostlink "));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));

    let extended = hostlink(&["version", "--extended"]);
    let stdout = String::from_utf8_lossy(&extended.stdout);
    assert!(stdout.contains("topologies: framed, frameless"));
    assert!(stdout.contains("default_host_version: 2.0.1"));
    assert!(stdout.contains("callback_delivery_min_host_version: 2.0.0"));
}
