use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use pretty_assertions::assert_eq;
use serde_json::Value;

fn cli_exe() -> &'static str {
    env!("CARGO_BIN_EXE_xshape")
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("xshape-core")
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn unique_temp_path(prefix: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    path.push(format!("{prefix}-{nonce}"));
    path
}

fn run_with_stdin(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(cli_exe())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn xshape");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait for xshape")
}

#[test]
fn transform_command_prints_shaped_json() {
    let output = Command::new(cli_exe())
        .args([
            "transform",
            "--xml",
            fixture("feed.xml").to_str().unwrap(),
            "--template",
            fixture("feed.template.json").to_str().unwrap(),
            "--check",
            "valid_xml",
        ])
        .output()
        .expect("run transform command");

    assert!(
        output.status.success(),
        "transform command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let actual: Value = serde_json::from_slice(&output.stdout).expect("stdout is json");
    let expected: Value = serde_json::from_str(
        &std::fs::read_to_string(fixture("feed.expected.json")).expect("read expected"),
    )
    .expect("expected is json");
    assert_eq!(actual, expected);
}

#[test]
fn transform_command_rejects_malformed_stdin() {
    let template = unique_temp_path("template");
    std::fs::write(&template, "{}").expect("write template");

    let output = run_with_stdin(
        &[
            "transform",
            "--xml",
            "-",
            "--template",
            template.to_str().unwrap(),
            "--check",
            "valid_xml",
        ],
        "Too Many Requests",
    );
    let _ = std::fs::remove_file(template);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("transform failed"), "stderr: {stderr}");
    assert!(stderr.contains("malformed"), "stderr: {stderr}");
}

#[test]
fn transform_command_without_check_prints_empty_object() {
    let template = unique_temp_path("template");
    std::fs::write(&template, r#"{"a": "/a"}"#).expect("write template");

    let output = run_with_stdin(
        &[
            "transform",
            "--xml",
            "-",
            "--template",
            template.to_str().unwrap(),
            "--compact",
        ],
        "<tag>invalid xml<ta/>",
    );
    let _ = std::fs::remove_file(template);

    assert!(
        output.status.success(),
        "transform command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "{}");
}

#[test]
fn transform_command_validates_template_before_reading_document() {
    let missing = unique_temp_path("xshape-missing-xml");
    let output = run_with_stdin(
        &[
            "transform",
            "--xml",
            missing.to_str().unwrap(),
            "--template",
            "-",
        ],
        r#"{"x":"/a["}"#,
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid template"), "stderr: {stderr}");
    assert!(!stderr.contains("failed to read"), "stderr: {stderr}");
}

#[test]
fn unknown_check_is_rejected_by_argument_parser() {
    let output = Command::new(cli_exe())
        .args([
            "to-json",
            "--xml",
            fixture("feed.xml").to_str().unwrap(),
            "--check",
            "schema",
        ])
        .output()
        .expect("run to-json command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("schema"), "stderr: {stderr}");
}

#[test]
fn to_json_command_outputs_generic_tree() {
    let output = run_with_stdin(
        &["to-json", "--xml", "-", "--compact"],
        r#"<a x="1"><b>hi</b></a>"#,
    );

    assert!(
        output.status.success(),
        "to-json command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        r##"{"a":[{"$":{"x":"1"},"b":[{"#text":"hi"}]}]}"##
    );
}

#[test]
fn pretty_command_reindents() {
    let output = run_with_stdin(&["pretty", "--xml", "-", "--indent", "4"], "<a><b>1</b><c/></a>");

    assert!(
        output.status.success(),
        "pretty command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "<a>\n    <b>1</b>\n    <c/>\n</a>\n"
    );
}

#[test]
fn check_command_reports_ok() {
    let output = Command::new(cli_exe())
        .args(["check", "--xml", fixture("feed.xml").to_str().unwrap()])
        .output()
        .expect("run check command");

    assert!(
        output.status.success(),
        "check command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK"));
}

#[test]
fn check_command_fails_on_malformed_document() {
    let output = run_with_stdin(&["check", "--xml", "-"], "<tag>invalid xml<ta/>");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not well-formed"), "stderr: {stderr}");
}
