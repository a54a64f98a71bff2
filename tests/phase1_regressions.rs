//! Pipeline construction and redirection scenarios (spec §8, S1-S3).

use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_esh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn esh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn single_command_runs_and_produces_output() {
    let output = run_shell(&["echo hello"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello"), "stdout was: {stdout}");
}

#[test]
fn two_stage_pipeline_feeds_output_forward() {
    let output = run_shell(&["echo hello | tr a-z A-Z"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("HELLO"), "stdout was: {stdout}");
}

#[test]
fn three_stage_pipeline_chains_correctly() {
    let output = run_shell(&["echo charlie bravo alpha | tr ' ' '\\n' | sort"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines, vec!["alpha", "bravo", "charlie"], "stdout was: {stdout}");
}

#[test]
fn output_redirection_writes_to_file() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let path = temp_dir.path().join("out.txt");

    let cmd = format!("echo hi > {}", path.display());
    let _ = run_shell(&[cmd.as_str()]);

    let contents = std::fs::read_to_string(&path).expect("read redirected file");
    assert_eq!(contents, "hi\n");
}

#[test]
fn append_redirection_keeps_prior_content() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let path = temp_dir.path().join("out.txt");
    std::fs::write(&path, "first\n").unwrap();

    let cmd = format!("echo second >> {}", path.display());
    let _ = run_shell(&[cmd.as_str()]);

    let contents = std::fs::read_to_string(&path).expect("read redirected file");
    assert_eq!(contents, "first\nsecond\n");
}

#[test]
fn input_redirection_feeds_stdin() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let input_path = temp_dir.path().join("input.txt");
    std::fs::write(&input_path, "from file\n").unwrap();

    let cmd = format!("cat < {}", input_path.display());
    let output = run_shell(&[cmd.as_str()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("from file"), "stdout was: {stdout}");
}

#[test]
fn command_not_found_reports_and_does_not_abort_shell() {
    let output = run_shell(&["this_program_does_not_exist_xyz", "echo STILL_ALIVE"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("command not found"),
        "stdout was: {stdout}"
    );
    assert!(stdout.contains("STILL_ALIVE"), "stdout was: {stdout}");
}

#[test]
fn semicolon_runs_both_pipelines_in_order() {
    let output = run_shell(&["echo one ; echo two"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines, vec!["one", "two"], "stdout was: {stdout}");
}
