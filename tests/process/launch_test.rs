//! Tests for launch specs and child process control.

use std::path::{Path, PathBuf};
use std::time::Duration;

use office_relay::process::{exit_code, LaunchError, LaunchSpec, SupervisedChild};

#[test]
fn spec_builder_keeps_argument_order() {
    let spec = LaunchSpec::new("python")
        .arg("convert.py")
        .args(["in.ppsx", "out.pptx"])
        .arg("secret");

    assert_eq!(spec.program(), Path::new("python"));
    assert_eq!(spec.get_args(), ["convert.py", "in.ppsx", "out.pptx", "secret"]);
}

#[test]
fn spec_working_dir() {
    let spec = LaunchSpec::new("pwd").working_dir("/tmp/work");
    assert_eq!(spec.get_working_dir(), Some(&PathBuf::from("/tmp/work")));
}

#[test]
fn spec_working_dir_not_set() {
    let spec = LaunchSpec::new("pwd");
    assert!(spec.get_working_dir().is_none());
}

#[test]
fn spec_is_clone() {
    let spec = LaunchSpec::new("echo").args(["a", "b"]);
    let cloned = spec.clone();
    assert_eq!(spec.command_line(), cloned.command_line());
}

#[test]
fn spawn_nonexistent_binary_fails() {
    let spec = LaunchSpec::new("/nonexistent/definitely-not-a-binary");
    let err = SupervisedChild::spawn(&spec).unwrap_err();

    assert!(matches!(err, LaunchError::NotFound { .. }));
    assert!(err.to_string().contains("definitely-not-a-binary"));
}

#[tokio::test]
async fn spawn_echo_and_wait() {
    let mut child = SupervisedChild::spawn(&LaunchSpec::new("echo").arg("hello")).unwrap();

    assert!(child.id().is_some());
    let status = child.wait().await.unwrap();
    assert!(status.success());
    assert_eq!(exit_code(status), 0);
}

#[tokio::test]
async fn take_stdout_once() {
    let mut child = SupervisedChild::spawn(&LaunchSpec::new("echo").arg("hello")).unwrap();

    assert!(child.take_stdout().is_some());
    assert!(child.take_stdout().is_none());
    assert!(child.take_stderr().is_some());
    assert!(child.take_stderr().is_none());

    child.wait().await.unwrap();
}

#[tokio::test]
async fn try_wait_on_running_process() {
    let mut child = SupervisedChild::spawn(&LaunchSpec::new("sleep").arg("10")).unwrap();

    assert!(child.try_wait().unwrap().is_none());

    child
        .graceful_terminate(Duration::from_millis(100))
        .await
        .unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn graceful_terminate_reports_sigterm() {
    let mut child = SupervisedChild::spawn(&LaunchSpec::new("sleep").arg("10")).unwrap();

    let status = child
        .graceful_terminate(Duration::from_secs(2))
        .await
        .unwrap();
    assert!(!status.success());
    assert_eq!(exit_code(status), 128 + 15);
}

#[cfg(unix)]
#[tokio::test]
async fn graceful_terminate_kills_process_ignoring_sigterm() {
    let spec = LaunchSpec::new("sh").args(["-c", "trap '' TERM; sleep 10"]);
    let mut child = SupervisedChild::spawn(&spec).unwrap();
    // Give the shell time to install the trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = child
        .graceful_terminate(Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(exit_code(status), 128 + 9);
}
