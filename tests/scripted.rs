#![cfg(target_os = "linux")]

use std::process::Command;
use tempfile::NamedTempFile;

fn run_batch(script: &str) -> (String, String, i32) {
    let mut file = NamedTempFile::new().expect("tempfile");
    std::io::Write::write_all(&mut file, script.as_bytes()).expect("write script");

    let output = Command::new(env!("CARGO_BIN_EXE_wsh"))
        .arg(file.path())
        .output()
        .expect("spawn wsh");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(1);
    (stdout, stderr, code)
}

#[test]
fn batch_runs_one_command_per_line() {
    let (out, err, code) = run_batch("echo one\necho two\n");
    assert!(err.is_empty(), "stderr: {err}");
    assert!(out.contains("one"));
    assert!(out.contains("two"));
    assert_eq!(code, 0);
}

#[test]
fn batch_pipeline_wires_stdout_to_stdin() {
    let (out, err, code) = run_batch("echo hi | cat\n");
    assert!(err.is_empty(), "stderr: {err}");
    assert!(out.contains("hi"));
    assert_eq!(code, 0);
}

#[test]
fn batch_cd_changes_directory_for_later_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = format!("cd {}\npwd\n", dir.path().display());
    let (out, _, code) = run_batch(&script);
    assert!(out.trim().ends_with(dir.path().file_name().unwrap().to_str().unwrap()));
    assert_eq!(code, 0);
}

#[test]
fn batch_cd_failure_reports_original_c_message() {
    let (out, _, code) = run_batch("cd /no/such/path/here\n");
    assert!(out.contains("Error: chdir to /no/such/path/here failed."));
    assert_eq!(code, 0);
}

#[test]
fn batch_jobs_lists_backgrounded_pipeline() {
    let (out, err, code) = run_batch("sleep 0.2 &\njobs\n");
    assert!(err.is_empty(), "stderr: {err}");
    assert!(out.contains("1: sleep"));
    assert_eq!(code, 0);
}

#[test]
fn batch_exits_zero_at_end_of_file_regardless_of_last_command() {
    let (_, _, code) = run_batch("false\n");
    assert_eq!(code, 0);
}

#[test]
fn batch_bad_cd_arity_reports_usage() {
    let (out, _, code) = run_batch("cd a b\n");
    assert!(out.contains("USAGE: cd dir"));
    assert_eq!(code, 0);
}
