//! Tests for supervised runs and live output relay.

use std::time::{Duration, Instant};

use office_relay::process::{
    HandlerError, LaunchError, LaunchSpec, RelayedLine, StreamOrigin, Supervisor,
};
use tokio_util::sync::CancellationToken;

fn sh(script: &str) -> LaunchSpec {
    LaunchSpec::new("sh").args(["-c", script])
}

fn contents(lines: &[RelayedLine], origin: StreamOrigin) -> Vec<String> {
    lines
        .iter()
        .filter(|l| l.origin == origin)
        .map(|l| l.content().to_string())
        .collect()
}

#[tokio::test]
async fn captures_both_streams_in_order() {
    let script = "for i in 1 2 3; do echo out$i; echo err$i >&2; done";
    let mut seen: Vec<RelayedLine> = Vec::new();
    let mut handler = |line: &RelayedLine| -> Result<(), HandlerError> {
        seen.push(line.clone());
        Ok(())
    };

    let result = Supervisor::new().run(sh(script), &mut handler).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(result.success());
    assert_eq!(result.stdout, "out1\nout2\nout3\n");
    assert_eq!(result.stderr, "err1\nerr2\nerr3\n");
    assert_eq!(result.handler_failures, 0);
    assert_eq!(contents(&seen, StreamOrigin::Stdout), ["out1", "out2", "out3"]);
    assert_eq!(contents(&seen, StreamOrigin::Stderr), ["err1", "err2", "err3"]);
}

#[tokio::test]
async fn nonzero_exit_is_a_result_not_an_error() {
    let result = Supervisor::new().output(sh("exit 7")).await.unwrap();

    assert_eq!(result.exit_code, 7);
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
    assert!(!result.success());
    assert!(!result.cancelled);
}

#[tokio::test]
async fn nonexistent_executable_is_launch_error() {
    let err = Supervisor::new()
        .output(LaunchSpec::new("/nonexistent/no-such-program"))
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::NotFound { .. }));
}

#[tokio::test]
async fn failing_handler_does_not_stop_draining() {
    let mut calls = 0;
    let mut handler = |_line: &RelayedLine| -> Result<(), HandlerError> {
        calls += 1;
        Err("handler always fails".into())
    };

    let result = Supervisor::new()
        .run(sh("echo a; echo b >&2; echo c"), &mut handler)
        .await
        .unwrap();

    assert_eq!(calls, 3);
    assert_eq!(result.handler_failures, 3);
    assert_eq!(result.stdout, "a\nc\n");
    assert_eq!(result.stderr, "b\n");
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn panicking_handler_does_not_stop_draining() {
    let mut handler = |line: &RelayedLine| -> Result<(), HandlerError> {
        assert_ne!(line.content(), "second", "handler rejects this line");
        Ok(())
    };

    let result = Supervisor::new()
        .run(sh("echo first; echo second; echo third"), &mut handler)
        .await
        .unwrap();

    assert_eq!(result.handler_failures, 1);
    assert_eq!(result.stdout, "first\nsecond\nthird\n");
}

#[tokio::test]
async fn interleaved_writes_are_not_merged_or_lost() {
    let script = r#"i=0; while [ $i -lt 2000 ]; do echo "out-$i-abcdefghij"; echo "err-$i-klmnopqrst" >&2; i=$((i+1)); done"#;
    let mut seen: Vec<RelayedLine> = Vec::new();
    let mut handler = |line: &RelayedLine| -> Result<(), HandlerError> {
        seen.push(line.clone());
        Ok(())
    };

    let result = Supervisor::new().run(sh(script), &mut handler).await.unwrap();

    let expected_out: Vec<String> = (0..2000).map(|i| format!("out-{i}-abcdefghij")).collect();
    let expected_err: Vec<String> = (0..2000).map(|i| format!("err-{i}-klmnopqrst")).collect();

    assert_eq!(contents(&seen, StreamOrigin::Stdout), expected_out);
    assert_eq!(contents(&seen, StreamOrigin::Stderr), expected_err);
    assert_eq!(result.stdout.lines().collect::<Vec<_>>(), expected_out);
    assert_eq!(result.stderr.lines().collect::<Vec<_>>(), expected_err);
}

#[tokio::test]
async fn output_larger_than_pipe_buffer_does_not_deadlock() {
    let result = tokio::time::timeout(
        Duration::from_secs(30),
        Supervisor::new().output(sh("yes relay-line | head -n 100000")),
    )
    .await
    .expect("supervisor deadlocked")
    .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout.lines().count(), 100_000);
    assert!(result.stdout.lines().all(|l| l == "relay-line"));
}

#[tokio::test]
async fn slow_handler_loses_nothing() {
    let mut count = 0;
    let mut handler = |_line: &RelayedLine| -> Result<(), HandlerError> {
        std::thread::sleep(Duration::from_millis(1));
        count += 1;
        Ok(())
    };

    let result = Supervisor::new()
        .run(sh("i=0; while [ $i -lt 200 ]; do echo $i; i=$((i+1)); done"), &mut handler)
        .await
        .unwrap();

    assert_eq!(count, 200);
    let expected: Vec<String> = (0..200).map(|i| i.to_string()).collect();
    assert_eq!(result.stdout.lines().collect::<Vec<_>>(), expected);
}

#[tokio::test]
async fn final_line_without_newline_is_kept() {
    let mut seen: Vec<RelayedLine> = Vec::new();
    let mut handler = |line: &RelayedLine| -> Result<(), HandlerError> {
        seen.push(line.clone());
        Ok(())
    };

    let result = Supervisor::new()
        .run(LaunchSpec::new("printf").arg("a\\nb"), &mut handler)
        .await
        .unwrap();

    assert_eq!(result.stdout, "a\nb");
    assert_eq!(contents(&seen, StreamOrigin::Stdout), ["a", "b"]);
}

#[tokio::test]
async fn invalid_utf8_is_replaced_not_fatal() {
    let result = Supervisor::new()
        .output(LaunchSpec::new("printf").arg("ok \\377 end\\n"))
        .await
        .unwrap();

    assert_eq!(result.stdout, "ok \u{FFFD} end\n");
}

#[tokio::test]
async fn output_after_parent_exit_is_still_drained() {
    // The background subshell keeps stdout open after the shell itself exits.
    let result = Supervisor::new()
        .output(sh("(sleep 0.3; echo late) & echo early"))
        .await
        .unwrap();

    assert_eq!(result.stdout, "early\nlate\n");
}

#[tokio::test]
async fn runs_in_working_dir() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let temp_path = temp_dir.path().canonicalize().unwrap();

    let result = Supervisor::new()
        .output(LaunchSpec::new("pwd").working_dir(&temp_path))
        .await
        .unwrap();

    assert_eq!(result.stdout.trim(), temp_path.to_str().unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn signal_exit_maps_to_shell_code() {
    let result = Supervisor::new().output(sh("kill -9 $$")).await.unwrap();
    assert_eq!(result.exit_code, 128 + 9);
}

#[tokio::test]
async fn cancellation_terminates_and_returns_buffered_output() {
    let token = CancellationToken::new();
    let supervisor = Supervisor::new()
        .with_terminate_timeout(Duration::from_millis(500))
        .with_cancellation(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = supervisor
        .output(sh("echo started; exec sleep 30"))
        .await
        .unwrap();

    assert!(result.cancelled);
    assert!(!result.success());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.stdout, "started\n");
}

#[tokio::test]
async fn poll_interval_is_tunable() {
    let supervisor = Supervisor::new().with_poll_interval(Duration::from_millis(1));
    assert_eq!(supervisor.poll_interval(), Duration::from_millis(1));

    let result = supervisor.output(sh("echo fast")).await.unwrap();
    assert_eq!(result.stdout, "fast\n");
}

#[tokio::test]
async fn exit_after_streams_close_is_awaited() {
    let result = Supervisor::new()
        .output(sh("echo before; exec >&- 2>&-; sleep 0.3; exit 4"))
        .await
        .unwrap();

    assert_eq!(result.exit_code, 4);
    assert_eq!(result.stdout, "before\n");
    assert!(!result.cancelled);
}

#[tokio::test]
async fn cancellation_after_streams_close() {
    let token = CancellationToken::new();
    let supervisor = Supervisor::new()
        .with_terminate_timeout(Duration::from_millis(500))
        .with_cancellation(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = supervisor
        .output(sh("echo before; exec >&- 2>&-; exec sleep 30"))
        .await
        .unwrap();

    assert!(result.cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.stdout, "before\n");
}
