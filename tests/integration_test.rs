use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn fixture(name: &str) -> String {
    format!("{}/tests/scripts/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn write_script(script: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create test script");
    file.write_all(script.as_bytes())
        .expect("Failed to write test script");
    file
}

fn run(script: &NamedTempFile, extra: &[&str], program: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_expectty"))
        .arg("--script")
        .arg(script.path())
        .args(extra)
        .arg("--")
        .args(program)
        .output()
        .expect("Failed to execute expectty")
}

#[test]
fn test_basic_script_execution() {
    let script = write_script(
        r#"
expect "Who are you?"
send "Fred"   # answer the prompt
expect "Hello,"
expect_eof
"#,
    );

    let output = run(&script, &[], &["/bin/sh", &fixture("who.sh")]);

    assert!(
        output.status.success(),
        "expectty failed with stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Who are you?"), "got {stdout}");
    assert!(stdout.contains("Hello, Fred."), "got {stdout}");
}

#[test]
fn test_exit_code_follows_program() {
    let script = write_script("expect_eof\n");

    let output = run(&script, &[], &["/bin/sh", &fixture("fail.sh")]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Something went wrong"), "got {stdout}");
}

#[test]
fn test_quiet_suppresses_transcript() {
    let script = write_script("expect \"Who are you?\"\nsend \"Fred\"\nexpect_eof\n");

    let output = run(&script, &["--quiet"], &["/bin/sh", &fixture("who.sh")]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty(), "got {:?}", output.stdout);
}

#[test]
fn test_running_program_is_stopped_after_script() {
    let script = write_script("expect \"Sleeping\"\n");

    let started = std::time::Instant::now();
    let output = run(&script, &[], &["/bin/sh", &fixture("sleeper.sh")]);

    assert!(output.status.success());
    assert!(started.elapsed() < std::time::Duration::from_secs(60));
}

#[test]
fn test_expect_timeout_fails_run() {
    let script = write_script("expect \"never printed\"\n");

    let output = run(
        &script,
        &["--timeout", "300ms"],
        &["/bin/sh", &fixture("sleeper.sh")],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Timeout"), "got {stderr}");
    assert!(stderr.contains("never printed"), "got {stderr}");
}

#[test]
fn test_invalid_script_is_rejected() {
    let script = write_script("send \"ok\"\nfrobnicate \"x\"\n");

    let output = run(&script, &[], &["/bin/sh", &fixture("who.sh")]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown command"), "got {stderr}");
    assert!(stderr.contains("line 2"), "got {stderr}");
}

#[test]
fn test_missing_program() {
    let script = write_script("expect_eof\n");

    let output = run(&script, &[], &["/nonexistent/expectty-missing"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to spawn"), "got {stderr}");
}
